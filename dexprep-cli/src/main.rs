//! dexprep CLI: terminal interface for the sprite dataset preparation pipeline.
//!
//! Runs the whole pipeline or any single stage against a dataset directory.

mod commands;

use clap::Parser;
use dexprep_core::PrepError;
use dexprep_core::error::CONFIG_EXIT_CODE;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// dexprep: prepare a sprite type-classification dataset for training
#[derive(Parser, Debug)]
#[command(name = "dexprep", version, about, long_about = None)]
struct Cli {
    /// Dataset root (defaults to ../data, relative to a 'manipulate' directory)
    #[arg(short, long)]
    data_root: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run every stage: check, normalize, reshape, partition, augment, prune
    Run {
        /// Also write the variant-expanded label table
        #[arg(long)]
        update_labels: bool,
        /// File name of the label table under the data root
        #[arg(long)]
        labels_file: Option<String>,
    },
    /// Validate the working directory and inputs without changing anything
    Check,
    /// Convert PNG sprites to opaque JPEGs
    Normalize,
    /// Print the long (Name, Type) label table as CSV
    Reshape,
    /// Build train/test class directories and place images
    Partition,
    /// Write flip/mirror/rotate derivatives for every training image
    Augment,
    /// Remove un-augmented originals from the training tree
    Prune,
    /// Write the label table extended with one row per derivative
    UpdateLabels {
        /// Output file name under the data root
        #[arg(long)]
        file: Option<String>,
    },
    /// Show the run manifest and verify its hash chain
    Manifest,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration to .dexprep/config.toml
    Init,
    /// Show the merged configuration
    Show,
}

/// Configuration could not be loaded or merged.
#[derive(Debug, thiserror::Error)]
#[error("Configuration error: {0}")]
pub(crate) struct ConfigError(pub String);

fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.quiet);

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("error: cannot determine working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let settings = commands::Settings {
        cwd,
        data_root: cli.data_root,
        config_path: cli.config,
        quiet: cli.quiet,
    };

    match commands::handle_command(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "dexprep failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Human-readable stderr logging plus a daily JSON log file.
fn init_logging(verbose: u8, quiet: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "dexprep", "dexprep")
        .map(|d| d.data_dir().join("logs"))
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(&dir, "dexprep.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(json_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
            None
        }
    }
}

/// Map an error to the process exit code of its kind.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(prep) = err.downcast_ref::<PrepError>() {
        return prep.exit_code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_EXIT_CODE;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "dexprep",
            "--data-root",
            "/srv/dex",
            "-vv",
            "run",
            "--update-labels",
            "--labels-file",
            "long.csv",
        ])
        .unwrap();
        assert_eq!(cli.data_root, Some(PathBuf::from("/srv/dex")));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                update_labels,
                labels_file,
            } => {
                assert!(update_labels);
                assert_eq!(labels_file.as_deref(), Some("long.csv"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_stage_subcommands() {
        for name in ["check", "normalize", "reshape", "partition", "augment", "prune"] {
            assert!(Cli::try_parse_from(["dexprep", name]).is_ok(), "{name}");
        }
        let cli = Cli::try_parse_from(["dexprep", "update-labels", "--file", "x.csv"]).unwrap();
        assert!(matches!(cli.command, Commands::UpdateLabels { file: Some(_) }));
        let cli = Cli::try_parse_from(["dexprep", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["dexprep"]).is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        let err = anyhow::Error::from(PrepError::AlreadyProcessed {
            reason: "manifest".into(),
        });
        assert_eq!(exit_code(&err), 5);

        let err = anyhow::Error::from(PrepError::missing("label file", "/x"))
            .context("while checking inputs");
        assert_eq!(exit_code(&err), 4);

        let err = anyhow::Error::from(ConfigError("bad toml".into()));
        assert_eq!(exit_code(&err), CONFIG_EXIT_CODE);

        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
