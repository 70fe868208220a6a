use clap::Args;
use console::style;
use nexus_codegen::{CONFIG_FILENAME, check_domain};
use std::path::PathBuf;

use crate::cli::run_cli_async;
use crate::common::{display_path, generate_selected, load_config};

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
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
        help = "Only check this domain (repeatable). Defaults to every configured domain"
    )]
    pub domains: Vec<String>,
    #[arg(long, help = "List stale files without printing their diffs")]
    pub quiet: bool,
}

pub async fn run(args: CheckArgs) -> i32 {
    run_cli_async(move || async move { run_inner(&args) }).await
}

fn run_inner(args: &CheckArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let generated = generate_selected(&config, &args.domains)?;

    let mut stale_total = 0;
    for domain in &generated {
        let stale = check_domain(domain).map_err(|err| err.to_string())?;
        if stale.is_empty() {
            println!(
                "{} {} is up to date",
                style("✓").green(),
                style(&domain.domain).bold()
            );
            continue;
        }

        println!(
            "{} {}: {} stale file(s)",
            style("✗").red(),
            style(&domain.domain).bold(),
            stale.len()
        );
        for file in &stale {
            println!("  {}", display_path(&config, &file.path));
            if !args.quiet {
                print!("{}", file.diff);
            }
        }
        stale_total += stale.len();
    }

    if stale_total > 0 {
        return Err(format!(
            "{stale_total} generated file(s) out of date; run `nexus generate`"
        ));
    }
    Ok(())
}
