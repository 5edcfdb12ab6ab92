//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};
use readaloud_cli::{Cli, Commands, handlers, load_settings};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    // Logs go to stderr; stdout carries the rendered text.
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Speak(args) => handlers::speak::execute(&settings, args).await?,
        Commands::Voices => handlers::voices::execute(&settings),
        Commands::Languages { json } => handlers::languages::execute(&settings, json)?,
    }
    Ok(())
}
