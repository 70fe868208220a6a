//! The `nexus` command-line tool.

fn main() {
    nexus_cli::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    std::process::exit(nexus_cli::run_cli(args));
}
