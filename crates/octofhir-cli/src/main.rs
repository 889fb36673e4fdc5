mod cli;
mod client;
mod commands;
mod config;
mod files;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::{print_error, print_warning};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    if let Some(warning) = dotenv_warning(dotenvy::dotenv()) {
        print_warning(&warning);
    }

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    observability::init_tracing(level);

    match &cli.command {
        Commands::Export(args) => commands::export::export(&config, args).await?,
        Commands::Import(args) => commands::import::import(&config, args).await?,
        Commands::Resolve(args) => commands::resolve::resolve(args)?,
    }

    Ok(())
}

/// A missing .env is fine; anything else is worth a warning.
fn dotenv_warning<T>(loaded: dotenvy::Result<T>) -> Option<String> {
    match loaded {
        Ok(_) => None,
        Err(dotenvy::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(format!("Failed to load .env file: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dotenv_is_silent() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, ".env");
        assert_eq!(dotenv_warning::<()>(Err(dotenvy::Error::Io(missing))), None);
        assert_eq!(dotenv_warning(Ok(())), None);
    }

    #[test]
    fn test_malformed_dotenv_warns() {
        let malformed = dotenvy::Error::LineParse("OCTOFHIR SOURCE".into(), 8);
        let warning = dotenv_warning::<()>(Err(malformed)).unwrap();
        assert!(warning.starts_with("Failed to load .env file"));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, ".env");
        assert!(dotenv_warning::<()>(Err(dotenvy::Error::Io(denied))).is_some());
    }
}
