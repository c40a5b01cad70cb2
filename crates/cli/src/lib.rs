pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use stockpilot_core::config::{AnalyticsConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stockpilot",
    about = "Stockpilot merchandising analytics CLI",
    long_about = "Classify SKUs, mine product associations, recommend kits and size stock from a JSON export of sales lines.",
    after_help = "Examples:\n  stockpilot analyze --input sales.json\n  stockpilot kits --input sales.json --threshold 0.7\n  stockpilot config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the full analytics recompute and print the report as JSON")]
    Analyze(AnalyzeArgs),
    #[command(about = "Recommend product kits, optionally with an overridden association threshold")]
    Kits(KitsArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config {
        #[arg(long, help = "Config file to read instead of stockpilot.toml")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[arg(long, help = "JSON array of sales lines")]
    pub input: PathBuf,
    #[arg(long = "as-of", help = "Reference date (YYYY-MM-DD); defaults to today")]
    pub as_of: Option<NaiveDate>,
    #[arg(long, help = "Config file to read instead of stockpilot.toml")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Association method: auto, correlation or basket")]
    pub method: Option<String>,
    #[arg(long, help = "Analysis window length in months")]
    pub window_months: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct KitsArgs {
    #[arg(long, help = "JSON array of sales lines")]
    pub input: PathBuf,
    #[arg(
        long,
        help = "Minimum association strength for a kit (-1..=1); with basket mining, the minimum rule confidence"
    )]
    pub threshold: Option<f64>,
    #[arg(long = "as-of", help = "Reference date (YYYY-MM-DD); defaults to today")]
    pub as_of: Option<NaiveDate>,
    #[arg(long, help = "Config file to read instead of stockpilot.toml")]
    pub config: Option<PathBuf>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Command::Analyze(args) => args.config.clone(),
        Command::Kits(args) => args.config.clone(),
        Command::Config { config } => config.clone(),
    };
    init_logging(&logging_config(config_path));

    let result = match cli.command {
        Command::Analyze(args) => commands::analyze::run(&args),
        Command::Kits(args) => commands::kits::run(&args),
        Command::Config { config } => commands::config::run(config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logging settings from the effective configuration. Config errors are
/// reported by the command itself, so defaults are fine here.
fn logging_config(config_path: Option<PathBuf>) -> LoggingConfig {
    let options = LoadOptions { config_path, ..LoadOptions::default() };
    AnalyticsConfig::load(options)
        .map(|config| config.logging)
        .unwrap_or_else(|_| AnalyticsConfig::default().logging)
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig) {
    let filter = log_filter(logging, std::env::var("RUST_LOG").ok().as_deref());
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// `RUST_LOG` directives win over the configured level.
fn log_filter(logging: &LoggingConfig, rust_log: Option<&str>) -> EnvFilter {
    if let Some(filter) = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }

    let level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig { level: level.to_string(), format: LogFormat::Compact }
    }

    #[test]
    fn configured_level_sets_the_filter() {
        let filter = log_filter(&logging("debug"), None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = log_filter(&logging("nonsense"), Some("  "));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn rust_log_overrides_the_configured_level() {
        let filter = log_filter(&logging("debug"), Some("warn"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }
}
