//! Training and evaluation series written as CSV for external charting.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::trainer::{EvaluationData, LossRecord};
use crate::error::Result;

/// Files written by [`save_plots`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlotFiles {
    pub loss: PathBuf,
    pub evaluation: PathBuf,
}

fn write_series<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `<trial>_loss.csv` and `<trial>_evaluation.csv` into `plot_dir`
pub fn save_plots(
    plot_dir: &Path,
    trial_name: &str,
    losses: &[LossRecord],
    evaluation: &EvaluationData,
) -> Result<PlotFiles> {
    fs::create_dir_all(plot_dir)?;

    let files = PlotFiles {
        loss: plot_dir.join(format!("{trial_name}_loss.csv")),
        evaluation: plot_dir.join(format!("{trial_name}_evaluation.csv")),
    };

    write_series(&files.loss, losses)?;
    write_series(&files.evaluation, &evaluation.steps)?;

    info!(
        "Saved plot series to {} and {}",
        files.loss.display(),
        files.evaluation.display()
    );
    Ok(files)
}
