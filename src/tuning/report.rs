//! Ranked results persisted as CSV and as an HTML table.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::trial::TrialResult;
use crate::error::Result;

/// Base name of both report files
pub const RESULTS_FILE_STEM: &str = "hyperparameter_tuning_results";

/// Report columns, in order
pub const RESULT_COLUMNS: [&str; 6] = [
    "total_reward",
    "learning_rate",
    "batch_size",
    "epochs",
    "spoofing_threshold",
    "feature_weights",
];

/// One row of the results table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub total_reward: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub spoofing_threshold: f32,
    pub feature_weights: String,
}

impl From<&TrialResult> for ResultRow {
    fn from(result: &TrialResult) -> Self {
        Self {
            total_reward: result.total_reward,
            learning_rate: result.params.learning_rate,
            batch_size: result.params.batch_size,
            epochs: result.params.epochs,
            spoofing_threshold: result.params.spoofing_threshold,
            feature_weights: result.params.feature_weights_key.clone(),
        }
    }
}

impl ResultRow {
    fn cells(&self) -> [String; 6] {
        [
            self.total_reward.to_string(),
            self.learning_rate.to_string(),
            self.batch_size.to_string(),
            self.epochs.to_string(),
            self.spoofing_threshold.to_string(),
            self.feature_weights.clone(),
        ]
    }
}

/// Paths of the written report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFiles {
    pub csv: PathBuf,
    pub html: PathBuf,
}

/// Write the results table; the header is written even with no rows
pub fn write_csv(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(RESULT_COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the results as an HTML table
pub fn render_html(rows: &[ResultRow]) -> String {
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n");
    html.push_str("    <tr style=\"text-align: right;\">\n");
    for column in RESULT_COLUMNS {
        let _ = writeln!(html, "      <th>{column}</th>");
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in rows {
        html.push_str("    <tr>\n");
        for cell in row.cells() {
            let _ = writeln!(html, "      <td>{}</td>", escape_html(&cell));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>\n");
    html
}

/// Persist ranked results as `hyperparameter_tuning_results.{csv,html}`
pub fn save_results(output_dir: &Path, results: &[TrialResult]) -> Result<ReportFiles> {
    fs::create_dir_all(output_dir)?;
    let rows: Vec<ResultRow> = results.iter().map(ResultRow::from).collect();

    let files = ReportFiles {
        csv: output_dir.join(format!("{RESULTS_FILE_STEM}.csv")),
        html: output_dir.join(format!("{RESULTS_FILE_STEM}.html")),
    };
    write_csv(&files.csv, &rows)?;
    fs::write(&files.html, render_html(&rows))?;

    info!(
        rows = rows.len(),
        "Saved tuning results to {}",
        files.csv.display()
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::trial::Hyperparameters;

    fn result(reward: f64, key: &str) -> TrialResult {
        TrialResult {
            trial: "phase1_0".to_string(),
            total_reward: reward,
            params: Hyperparameters {
                learning_rate: 0.0005,
                batch_size: 64,
                epochs: 10,
                spoofing_threshold: 0.8,
                feature_weights_key: key.to_string(),
            },
        }
    }

    #[test]
    fn test_html_has_header_and_escapes() {
        let rows = vec![ResultRow::from(&result(3.5, "a<b"))];
        let html = render_html(&rows);
        assert!(html.contains("<th>total_reward</th>"));
        assert!(html.contains("<th>feature_weights</th>"));
        assert!(html.contains("<td>3.5</td>"));
        assert!(html.contains("<td>a&lt;b</td>"));
    }

    #[test]
    fn test_save_results_round_trip_columns() {
        let dir = std::env::temp_dir().join(format!("lobppo_report_{}", uuid::Uuid::new_v4()));
        let files = save_results(&dir, &[result(2.0, "default"), result(-1.0, "no_rolling_stats")])
            .unwrap();

        let csv = fs::read_to_string(&files.csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("total_reward,learning_rate,batch_size,epochs,spoofing_threshold,feature_weights")
        );
        assert_eq!(lines.next(), Some("2.0,0.0005,64,10,0.8,default"));
        assert_eq!(lines.count(), 1);
        assert!(files.html.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_results_keep_header() {
        let dir = std::env::temp_dir().join(format!("lobppo_report_{}", uuid::Uuid::new_v4()));
        let files = save_results(&dir, &[]).unwrap();

        let csv = fs::read_to_string(&files.csv).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("total_reward,"));

        let html = fs::read_to_string(&files.html).unwrap();
        assert!(!html.contains("<td>"));

        let _ = fs::remove_dir_all(&dir);
    }
}
