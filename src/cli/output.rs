//! Output formatting for `lobppo` commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::tuning::TrialResult;

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Console row of a ranked trial
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct RankedTrialRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    pub trial: String,
    pub total_reward: String,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub spoofing_threshold: f32,
    pub feature_weights: String,
}

impl RankedTrialRow {
    pub fn from_results(results: &[TrialResult]) -> Vec<Self> {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| Self {
                rank: i + 1,
                trial: r.trial.clone(),
                total_reward: format!("{:.4}", r.total_reward),
                learning_rate: r.params.learning_rate,
                batch_size: r.params.batch_size,
                epochs: r.params.epochs,
                spoofing_threshold: r.params.spoofing_threshold,
                feature_weights: r.params.feature_weights_key.clone(),
            })
            .collect()
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Print a simple key-value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("{key}: {value}");
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

/// Print a warning message.
pub fn print_warn(msg: &str) {
    println!("\x1b[33m{msg}\x1b[0m");
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m{msg}\x1b[0m");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::Hyperparameters;

    #[test]
    fn test_rows_are_ranked_in_order() {
        let params = Hyperparameters {
            learning_rate: 1e-3,
            batch_size: 64,
            epochs: 20,
            spoofing_threshold: 0.7,
            feature_weights_key: "default".to_string(),
        };
        let results = vec![
            TrialResult {
                trial: "phase2_6".to_string(),
                total_reward: 4.25,
                params: params.clone(),
            },
            TrialResult {
                trial: "phase1_1".to_string(),
                total_reward: -1.0,
                params,
            },
        ];

        let rows = RankedTrialRow::from_results(&results);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].total_reward, "4.2500");
        assert_eq!(rows[1].trial, "phase1_1");

        let table = Table::new(&rows).to_string();
        assert!(table.contains("phase2_6"));
        assert!(table.contains("feature_weights"));
    }
}
