use clap::Args;
use console::style;
use nexus_codegen::{CONFIG_FILENAME, write_domain};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use crate::cli::run_cli_async;
use crate::common::{display_path, format_elapsed_ms, generate_selected, load_config};

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        default_value = CONFIG_FILENAME,
        help = "Path to the generator configuration"
    )]
    pub config: PathBuf,
    #[arg(
        long = "domain",
        short = 'd',
        value_name = "NAME",
        help = "Only generate this domain (repeatable). Defaults to every configured domain"
    )]
    pub domains: Vec<String>,
}

pub async fn run(args: GenerateArgs) -> i32 {
    run_cli_async(move || async move { run_inner(&args) }).await
}

fn run_inner(args: &GenerateArgs) -> Result<(), String> {
    let started = Instant::now();
    let config = load_config(&args.config)?;

    // Everything renders before anything is written.
    let generated = generate_selected(&config, &args.domains)?;

    for domain in &generated {
        let summary = write_domain(domain).map_err(|err| err.to_string())?;
        for path in &summary.written {
            debug!(domain = %domain.domain, path = %path.display(), "Wrote file.");
        }
        println!(
            "{} {} → {} ({} endpoints: {} written, {} unchanged, {} removed)",
            style("✓").green(),
            style(&domain.domain).bold(),
            display_path(&config, &domain.target),
            domain.manifest.endpoints.len(),
            summary.written.len(),
            summary.unchanged,
            summary.removed.len(),
        );
    }

    println!(
        "Generated {} domain(s) in {}",
        generated.len(),
        format_elapsed_ms(started)
    );
    Ok(())
}
