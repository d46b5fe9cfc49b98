mod cli;
mod console;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; credentials may come from the environment.
    let _ = dotenvy::dotenv();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Watch {
            path,
            entry,
            options,
        } => console::watch(path, entry, options).await,
        Commands::Interactive { path, options } => console::interactive(path, options).await,
        Commands::Run { script, options } => console::run_once(script, options).await,
    }
}
