//! strmsync CLI - Command-line interface for strmsync
//!
//! Provides commands for:
//! - Running a full sync (rebuild every placeholder, optional orphan cleanup)
//! - Running an incremental sync (create placeholders for new files only)
//! - Inspecting and validating the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use strmsync_core::config::{Config, LoggingConfig};

mod commands;
mod output;

use commands::{config::ConfigCommand, full::FullCommand, incremental::IncrementalCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "strmsync",
    version,
    about = "Mirror a remote media store as local placeholder files"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit log records as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rebuild every placeholder and optionally remove orphans
    Full(FullCommand),
    /// Create placeholders for remote files that have none yet
    Incremental(IncrementalCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins; otherwise `-v` raises the configured level. Logs go to
/// stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8, json_logs: bool, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json_logs || logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    // Logging settings only; commands load the file themselves and report
    // parse errors properly.
    let logging = Config::load_or_default(&config_path).logging;
    init_tracing(cli.verbose, cli.json_logs, &logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Full(cmd) => cmd.execute(&config_path, format).await,
        Commands::Incremental(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn full_flags_parse() {
        let cli = Cli::try_parse_from([
            "strmsync",
            "--json",
            "-vv",
            "full",
            "--cleanup",
            "--dry-run",
            "--pair",
            "/media/movies#/Movies",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Full(cmd) => {
                assert!(cmd.cleanup);
                assert!(cmd.dry_run);
                assert_eq!(cmd.pairs, vec!["/media/movies#/Movies".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["strmsync", "incremental", "--config", "/tmp/c.yaml", "--json-logs"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Incremental(_)));
    }

    #[test]
    fn config_requires_subcommand() {
        assert!(Cli::try_parse_from(["strmsync", "config"]).is_err());
        let cli = Cli::try_parse_from(["strmsync", "config", "path"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Path)));
    }
}
