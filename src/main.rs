//! `gpu-cloud` CLI entrypoint.
//!
//! This is the main entrypoint for the gpu-cloud command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use gpu_cloud_manager::cli::{Cli, Commands, OutputFormatter};
use gpu_cloud_manager::config::{ConfigLoader, Settings};
use gpu_cloud_manager::error::Result;
use gpu_cloud_manager::marketplace::Marketplace;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging starts at the default level so config loading is visible.
    let log_handle = init_logging(cli.verbose);

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !cli.verbose {
        if let Err(e) = log_handle.reload(log_filter(false, &settings.log_level)) {
            warn!("Failed to apply log level '{}': {e}", settings.log_level);
        }
    }

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system and returns a handle to adjust its level.
fn init_logging(verbose: bool) -> reload::Handle<EnvFilter, Registry> {
    let (filter, handle) = reload::Layer::new(log_filter(verbose, DEFAULT_LOG_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    handle
}

const DEFAULT_LOG_LEVEL: &str = "info";

/// Builds the log filter; an invalid level falls back to the default.
fn log_filter(verbose: bool, level: &str) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }
}

/// Loads `.env` and the settings.
fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    let base = config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let loader = ConfigLoader::new().with_base_path(base);
    loader.load_dotenv()?;
    loader.load(config_path)
}

/// Main async entry point.
async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let market = Marketplace::from_settings(settings)?;

    if market.providers().next().is_none() {
        warn!("No provider is configured; set VAST_AI_API_KEY or RUNPOD_API_KEY");
    }

    let output = match cli.command {
        Commands::Search(args) => {
            let filter = args.to_filter();
            debug!("Search filter: {filter:?}");
            let mut offers = market.search_offers_advanced(&filter).await?;
            if let Some(limit) = args.limit {
                offers.truncate(limit);
            }
            formatter.format_offers(&offers)
        }
        Commands::Instances => formatter.format_instances(&market.list_instances().await?),
        Commands::Show { id } => formatter.format_instance(&market.get_instance(&id).await?),
        Commands::Create(args) => {
            let instance = market.create_instance(&args.to_request()).await?;
            formatter.format_instance(&instance)
        }
        Commands::Start { id } => {
            market.start_instance(&id).await?;
            formatter.format_action("started", &id)
        }
        Commands::Stop { id } => {
            market.stop_instance(&id).await?;
            formatter.format_action("stopped", &id)
        }
        Commands::Destroy { id, yes } => {
            if !yes && !confirm(&format!("Destroy {id}? This cannot be undone. [y/N]: "))? {
                eprintln!("Destroy cancelled.");
                return Ok(());
            }
            market.destroy_instance(&id).await?;
            formatter.format_action("destroyed", &id)
        }
        Commands::Stats => formatter.format_stats(&market.marketplace_stats().await?),
        Commands::Models => formatter.format_models(market.gpu_models()),
        Commands::Providers => formatter.format_providers(&market.supported_providers()),
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Asks for confirmation on stderr.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(true, "error").to_string(), "debug");
        assert_eq!(log_filter(false, "warn").to_string(), "warn");
        assert_eq!(log_filter(false, "gpu=loud").to_string(), "info");
    }

    #[test]
    fn test_log_level_reloads_after_startup() {
        let (filter, handle) = reload::Layer::new(log_filter(false, DEFAULT_LOG_LEVEL));
        let subscriber = tracing_subscriber::registry().with(filter);

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(tracing::Level::INFO));
            handle.reload(log_filter(false, "warn")).expect("reload");
            assert!(!tracing::enabled!(tracing::Level::INFO));
            assert!(tracing::enabled!(tracing::Level::WARN));
        });
    }
}
