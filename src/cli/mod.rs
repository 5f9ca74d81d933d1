//! lobppo CLI
//!
//! Commands:
//! - `lobppo extract-features` - Build the enhanced full channel and ticker tables
//! - `lobppo tune` - Run the two-phase hyperparameter search
//! - `lobppo trial` - Train and evaluate a single combination
//! - `lobppo show-config` - Print the effective configuration

pub mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::features::extract_features;
use crate::logging::{init_logging, init_logging_simple, EXTRACT_FEATURES_LOG, HYPERTUNING_LOG};
use crate::tuning::{
    evaluate_hyperparameters, tune_hyperparameters, Hyperparameters, PpoTrialEvaluator, Trial,
};
use output::{print_error, print_items, print_kv, print_success, print_warn, OutputMode, RankedTrialRow};

/// PPO spoofing detection on limit order book captures
#[derive(Parser, Debug)]
#[command(name = "lobppo")]
#[command(author, version, about = "Feature extraction and PPO hyperparameter search for spoofing detection")]
pub struct Cli {
    /// Directory holding default.toml and environment overrides
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the enhanced full channel and ticker tables
    ExtractFeatures,

    /// Run the two-phase hyperparameter search
    Tune {
        /// Concurrent trials (overrides search.max_workers)
        #[arg(long)]
        workers: Option<usize>,
        /// Print the ranked results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train and evaluate a single combination
    Trial {
        /// Defaults to ppo.learning_rate
        #[arg(long)]
        learning_rate: Option<f64>,
        /// Defaults to ppo.batch_size
        #[arg(long)]
        batch_size: Option<usize>,
        /// Defaults to ppo.n_epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Defaults to environment.spoofing_threshold
        #[arg(long)]
        spoofing_threshold: Option<f32>,
        /// Defaults to environment.feature_weights_key
        #[arg(long)]
        feature_weights: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig {
        /// Only print one section (e.g. ppo, paths)
        #[arg(long)]
        section: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = load_config(&self.config_dir)?;

        match self.command {
            Commands::ExtractFeatures => {
                let _guard = init_logging(&config.paths.log_dir, EXTRACT_FEATURES_LOG, &config.logging);
                run_extract_features(&config)
            }
            Commands::Tune { workers, json } => {
                let _guard = init_logging(&config.paths.log_dir, HYPERTUNING_LOG, &config.logging);
                run_tune(config, workers, OutputMode::from_json_flag(json)).await
            }
            Commands::Trial {
                learning_rate,
                batch_size,
                epochs,
                spoofing_threshold,
                feature_weights,
                json,
            } => {
                let _guard = init_logging(&config.paths.log_dir, HYPERTUNING_LOG, &config.logging);
                let defaults = config.current_hyperparameters();
                let params = Hyperparameters {
                    learning_rate: learning_rate.unwrap_or(defaults.learning_rate),
                    batch_size: batch_size.unwrap_or(defaults.batch_size),
                    epochs: epochs.unwrap_or(defaults.epochs),
                    spoofing_threshold: spoofing_threshold.unwrap_or(defaults.spoofing_threshold),
                    feature_weights_key: feature_weights.unwrap_or(defaults.feature_weights_key),
                };
                run_trial(config, params, OutputMode::from_json_flag(json)).await
            }
            Commands::ShowConfig { section } => {
                init_logging_simple();
                show_config(&config, section.as_deref())
            }
        }
    }
}

fn load_config(config_dir: &Path) -> Result<AppConfig> {
    let config = AppConfig::load_from(config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    if let Err(errors) = config.validate() {
        for e in &errors {
            print_error(&format!("  ✗ {e}"));
        }
        bail!("Invalid configuration ({} problems)", errors.len());
    }
    Ok(config)
}

fn run_extract_features(config: &AppConfig) -> Result<()> {
    let summary = extract_features(config).context("Feature extraction failed")?;

    print_success("Feature extraction complete");
    print_kv("  full channel rows", &summary.full_channel_rows.to_string());
    print_kv("  ticker rows", &summary.ticker_rows.to_string());
    print_kv(
        "  full channel output",
        &config.paths.full_channel_enhanced.display().to_string(),
    );
    print_kv("  ticker output", &config.paths.ticker_enhanced.display().to_string());
    Ok(())
}

async fn run_tune(mut config: AppConfig, workers: Option<usize>, mode: OutputMode) -> Result<()> {
    if let Some(workers) = workers {
        config.search.max_workers = workers;
    }

    let evaluator = Arc::new(PpoTrialEvaluator::new(config.clone()));
    let outcome = tune_hyperparameters(&config, evaluator).await?;

    print_items(&RankedTrialRow::from_results(&outcome.results), mode)?;
    if mode == OutputMode::Table {
        if outcome.failed > 0 {
            print_warn(&format!(
                "{} of {} trials failed, see {}",
                outcome.failed,
                outcome.attempted,
                config.paths.log_dir.join(HYPERTUNING_LOG).display()
            ));
        }
        print_kv("Results", &outcome.report.csv.display().to_string());
        print_kv("Report", &outcome.report.html.display().to_string());
    }
    Ok(())
}

async fn run_trial(config: AppConfig, params: Hyperparameters, mode: OutputMode) -> Result<()> {
    let trial = Trial::single(params);
    info!(trial = %trial.name(), "Running single trial");

    let evaluator = PpoTrialEvaluator::new(config);
    let result = tokio::task::spawn_blocking(move || evaluate_hyperparameters(&evaluator, &trial))
        .await
        .context("Trial task failed")?;

    match result {
        Some(result) => print_items(&RankedTrialRow::from_results(&[result]), mode),
        None => bail!("Trial failed, see {}", HYPERTUNING_LOG),
    }
}

fn show_config(config: &AppConfig, section: Option<&str>) -> Result<()> {
    let value = toml::Value::try_from(config).context("Failed to serialize configuration")?;

    let value = match section {
        Some(name) => value
            .get(name)
            .cloned()
            .with_context(|| format!("Unknown configuration section '{name}'"))?,
        None => value,
    };

    println!("{}", toml::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tune() {
        let cli = Cli::try_parse_from(["lobppo", "tune", "--workers", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tune {
                workers: Some(4),
                json: false
            }
        ));
        assert_eq!(cli.config_dir, PathBuf::from("config"));
    }

    #[test]
    fn test_parse_trial_overrides() {
        let cli = Cli::try_parse_from([
            "lobppo",
            "--config-dir",
            "/etc/lobppo",
            "trial",
            "--learning-rate",
            "0.001",
            "--feature-weights",
            "no_rolling_stats",
        ])
        .unwrap();

        match cli.command {
            Commands::Trial {
                learning_rate,
                batch_size,
                feature_weights,
                ..
            } => {
                assert_eq!(learning_rate, Some(0.001));
                assert_eq!(batch_size, None);
                assert_eq!(feature_weights.as_deref(), Some("no_rolling_stats"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config_dir, PathBuf::from("/etc/lobppo"));
    }

    #[test]
    fn test_show_config_section() {
        let config = AppConfig::default();
        assert!(show_config(&config, Some("ppo")).is_ok());
        assert!(show_config(&config, Some("nope")).is_err());
    }
}
