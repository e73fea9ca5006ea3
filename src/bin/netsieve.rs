use clap::Parser;
use colored::Colorize;
use netsieve_core::cli::{self, Cli};
use netsieve_core::exit::NetsieveExit;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> NetsieveExit {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli::execute(&cli) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            NetsieveExit::for_error(&e)
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("netsieve_core=debug,netsieve=debug")
    } else {
        EnvFilter::new("netsieve_core=warn,netsieve=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("logging initialized (verbose={verbose})");
}
