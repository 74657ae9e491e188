//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::ConfigError;
use dexprep_core::config::{PrepConfig, init_config, load_config, load_config_file};
use dexprep_core::labels::write_labels;
use dexprep_core::{Pipeline, RunSummary};
use std::path::PathBuf;

/// Process-level settings resolved from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cwd: PathBuf,
    pub data_root: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub quiet: bool,
}

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, settings),
        Commands::Run {
            update_labels,
            labels_file,
        } => {
            let mut config = resolve_config(settings)?;
            config.labels.update |= update_labels;
            if let Some(file) = labels_file {
                config.labels.output_file = file;
            }
            let summary = pipeline(config, settings).run(&settings.cwd)?;
            if !settings.quiet {
                print_summary(&summary);
            }
            Ok(())
        }
        Commands::Check => {
            let pipeline = pipeline(resolve_config(settings)?, settings);
            pipeline.preflight(&settings.cwd)?;
            println!(
                "Dataset at {} is ready to be prepared.",
                pipeline.layout().data_root().display()
            );
            Ok(())
        }
        Commands::Normalize => {
            let report = pipeline(resolve_config(settings)?, settings).normalize()?;
            println!(
                "Normalized {} image(s), {} item(s) without a source image.",
                report.converted, report.skipped
            );
            Ok(())
        }
        Commands::Reshape => {
            let rows = pipeline(resolve_config(settings)?, settings).load_label_rows()?;
            write_labels(std::io::stdout().lock(), &rows)?;
            Ok(())
        }
        Commands::Partition => {
            let report = pipeline(resolve_config(settings)?, settings).partition()?;
            println!(
                "Created {} class(es): {} train copies, {} test copies, {} row(s) without an image.",
                report.classes, report.train_copies, report.test_copies, report.skipped
            );
            print_cleanup_failures(&report.cleanup_failures);
            Ok(())
        }
        Commands::Augment => {
            let report = pipeline(resolve_config(settings)?, settings).augment()?;
            println!(
                "Wrote {} derivative(s) for {} training image(s).",
                report.written, report.sources
            );
            Ok(())
        }
        Commands::Prune => {
            let report = pipeline(resolve_config(settings)?, settings).remove_leakage()?;
            println!("Removed {} original(s) from the training tree.", report.removed);
            Ok(())
        }
        Commands::UpdateLabels { file } => {
            let path = pipeline(resolve_config(settings)?, settings).update_labels(file.as_deref())?;
            println!("Wrote label table to {}", path.display());
            Ok(())
        }
        Commands::Manifest => {
            let pipeline = pipeline(resolve_config(settings)?, settings);
            match pipeline.manifest()? {
                Some(manifest) => {
                    println!("{}", serde_json::to_string_pretty(&manifest)?);
                    if manifest.verify_integrity() {
                        println!("Hash chain: valid ({} stage(s))", manifest.stages.len());
                    } else {
                        anyhow::bail!(
                            "run manifest hash chain is broken: {}",
                            pipeline.layout().manifest_path().display()
                        );
                    }
                }
                None => println!(
                    "No run manifest at {}",
                    pipeline.layout().manifest_path().display()
                ),
            }
            Ok(())
        }
    }
}

fn handle_config(action: ConfigAction, settings: &Settings) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            match init_config(&settings.cwd)? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!("Configuration file already exists, leaving it unchanged."),
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = resolve_config(settings)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Load configuration and apply command-line overrides.
///
/// An explicit `--data-root` replaces the working-directory convention, so
/// the anchor check is switched off with it.
fn resolve_config(settings: &Settings) -> anyhow::Result<PrepConfig> {
    let config = match &settings.config_path {
        Some(path) => load_config_file(path),
        None => load_config(Some(&settings.cwd), None),
    }
    .map_err(|e| ConfigError(e.to_string()))?;
    Ok(apply_overrides(config, settings.data_root.clone()))
}

fn apply_overrides(mut config: PrepConfig, data_root: Option<PathBuf>) -> PrepConfig {
    if let Some(root) = data_root {
        config.paths.data_root = root;
        config.paths.enforce_anchor = false;
    }
    config
}

fn pipeline(config: PrepConfig, settings: &Settings) -> Pipeline {
    Pipeline::from_config(config, &settings.cwd)
}

fn print_summary(summary: &RunSummary) {
    println!("Dataset prepared:");
    println!(
        "  items: {}  label rows: {}",
        summary.items, summary.label_rows
    );
    println!(
        "  normalized: {}  without image: {}",
        summary.normalize.converted, summary.normalize.skipped
    );
    println!(
        "  classes: {}  train copies: {}  test copies: {}",
        summary.partition.classes, summary.partition.train_copies, summary.partition.test_copies
    );
    println!(
        "  derivatives written: {}  originals removed from train: {}",
        summary.augment.written, summary.leakage.removed
    );
    if let Some(path) = &summary.label_table {
        println!("  label table: {}", path.display());
    }
    print_cleanup_failures(&summary.partition.cleanup_failures);
}

fn print_cleanup_failures(failures: &[dexprep_core::partition::CleanupFailure]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("  {} file(s) could not be removed:", failures.len());
    for failure in failures {
        eprintln!("    {}: {}", failure.path.display(), failure.reason);
    }
}
