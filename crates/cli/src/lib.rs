//! Command-line front end of the Nexus API toolkit.

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod cli;
mod common;

/// Crates whose level a plain `NEXUS_LOG` value sets.
const LOG_TARGETS: [&str; 4] = ["nexus_cli", "nexus_codegen", "nexus_client", "nexus_common"];

#[derive(Parser, Debug)]
#[command(
    name = "nexus",
    version,
    about = "\x1b[36mnexus\x1b[0m generates and exercises the typed Nexus API clients"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 🔨 Generate client code for the configured domains
    Generate(cli::generate::GenerateArgs),
    /// 🔍 Fail when generated client code is out of date
    Check(cli::check::CheckArgs),
    /// 📋 Print the endpoint table of a domain
    Endpoints(cli::endpoints::EndpointsArgs),
    /// 📡 Call one endpoint of a domain through the runtime client
    Call(cli::call::CallArgs),
}

/// Parse `args` (program name first), run the command and return its exit code.
pub fn run_cli(args: Vec<String>) -> i32 {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to create tokio runtime: {err}");
            return 1;
        }
    };

    runtime.block_on(run_cli_async(args))
}

/// [`run_cli`] on an already running runtime.
pub async fn run_cli_async(args: Vec<String>) -> i32 {
    match Cli::try_parse_from(args) {
        Ok(cli) => match cli.command {
            Some(Commands::Generate(args)) => cli::generate::run(args).await,
            Some(Commands::Check(args)) => cli::check::run(args).await,
            Some(Commands::Endpoints(args)) => cli::endpoints::run(args).await,
            Some(Commands::Call(args)) => cli::call::run(args).await,
            None => {
                let mut cmd = Cli::command();
                let _ = cmd.print_help();
                println!();
                0
            }
        },
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

/// Install the stderr log subscriber.
pub fn init_tracing() {
    let filter = log_filter(std::env::var("NEXUS_LOG").ok().as_deref());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

// NEXUS_LOG is either a level ("trace" .. "error") applied to the nexus
// crates, or a full filter spec like "nexus_client=debug,reqwest=warn".
fn log_filter(env: Option<&str>) -> String {
    match env {
        Some(level) if is_plain_level(level) => LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(","),
        Some(spec) if !spec.trim().is_empty() => spec.to_string(),
        _ => log_filter(Some("info")),
    }
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}
