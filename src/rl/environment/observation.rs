//! Observation Encoding
//!
//! Turns the enhanced full channel table into per-row observation vectors
//! and spoofing anomaly scores.

use crate::data::EventTable;
use crate::error::{LobError, Result};
use crate::rl::config::FeatureWeights;

/// Feature group an engineered column belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGroup {
    Price,
    Size,
    RollingStats,
    OrderFlowImbalance,
    CancellationRatio,
    HourOfDay,
}

impl FeatureGroup {
    /// Classify a column name; `None` for columns that are not features
    pub fn classify(name: &str) -> Option<Self> {
        match name {
            "price" | "last_price" => return Some(FeatureGroup::Price),
            "size" | "last_size" | "signed_size" => return Some(FeatureGroup::Size),
            "order_flow_imbalance" => return Some(FeatureGroup::OrderFlowImbalance),
            "cancel_to_received_ratio" => return Some(FeatureGroup::CancellationRatio),
            _ => {}
        }
        if is_rolling_stat(name) {
            return Some(FeatureGroup::RollingStats);
        }
        if name
            .strip_prefix("hour_")
            .is_some_and(|h| !h.is_empty() && h.chars().all(|c| c.is_ascii_digit()))
        {
            return Some(FeatureGroup::HourOfDay);
        }
        None
    }

    pub fn weight(&self, weights: &FeatureWeights) -> f32 {
        match self {
            FeatureGroup::Price => weights.price,
            FeatureGroup::Size => weights.size,
            FeatureGroup::RollingStats => weights.rolling_stats,
            FeatureGroup::OrderFlowImbalance => weights.order_flow_imbalance,
            FeatureGroup::CancellationRatio => weights.cancellation_ratio,
            FeatureGroup::HourOfDay => weights.hour_of_day,
        }
    }
}

/// `{column}_{window}_{mean|std|var}`
fn is_rolling_stat(name: &str) -> bool {
    let mut parts = name.rsplitn(3, '_');
    let op = parts.next();
    let window = parts.next();
    let base = parts.next();
    matches!(op, Some("mean" | "std" | "var"))
        && window.is_some_and(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_digit()))
        && base.is_some_and(|b| !b.is_empty())
}

/// Z-score a column over its finite values; undefined cells become 0
fn standardize(values: &[f64]) -> Vec<f32> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return vec![0.0; values.len()];
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = if var > 1e-12 { var.sqrt() } else { 1.0 };

    values
        .iter()
        .map(|v| {
            if v.is_finite() {
                ((v - mean) / std) as f32
            } else {
                0.0
            }
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Encoded observations and anomaly scores for every row of a table
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature column names in observation order
    pub columns: Vec<String>,
    /// Row-major weighted observations
    pub observations: Vec<Vec<f32>>,
    /// Spoofing anomaly score per row, in (0, 1)
    pub anomaly_scores: Vec<f32>,
}

impl FeatureMatrix {
    /// Encode every feature column of `table` with the given weights
    pub fn encode(table: &EventTable, weights: &FeatureWeights) -> Result<Self> {
        let rows = table.num_rows();
        let mut columns = Vec::new();
        let mut encoded: Vec<Vec<f32>> = Vec::new();

        for name in table.column_names() {
            let Some(group) = FeatureGroup::classify(name) else {
                continue;
            };
            let Ok(values) = table.numeric(name) else {
                continue;
            };
            let scaled = match group {
                FeatureGroup::HourOfDay => values
                    .iter()
                    .map(|v| if v.is_finite() { *v as f32 } else { 0.0 })
                    .collect(),
                _ => standardize(&values),
            };
            let weight = group.weight(weights);
            columns.push(name.clone());
            encoded.push(scaled.into_iter().map(|v| v * weight).collect());
        }

        if columns.is_empty() {
            return Err(LobError::Environment(
                "table has no engineered feature columns".to_string(),
            ));
        }

        let observations = (0..rows)
            .map(|row| encoded.iter().map(|column| column[row]).collect())
            .collect();

        Ok(Self {
            columns,
            observations,
            anomaly_scores: anomaly_scores(table, weights),
        })
    }

    pub fn num_features(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.observations.len()
    }
}

/// Shortest-window rolling mean of `size`, if the table has one
fn size_rolling_mean(table: &EventTable) -> Option<Vec<f64>> {
    table
        .column_names()
        .iter()
        .filter_map(|name| {
            let window = name.strip_prefix("size_")?.strip_suffix("_mean")?;
            window.parse::<usize>().ok().map(|w| (w, name))
        })
        .min_by_key(|(w, _)| *w)
        .and_then(|(_, name)| table.numeric(name).ok())
}

/// Weighted spoofing indicators squashed into (0, 1).
///
/// Indicators: cancellation ratio, absolute order flow imbalance, order size
/// and size deviation from its rolling mean. Missing indicators contribute 0.
pub fn anomaly_scores(table: &EventTable, weights: &FeatureWeights) -> Vec<f32> {
    let rows = table.num_rows();
    let z = |name: &str| {
        table
            .numeric(name)
            .map(|v| standardize(&v))
            .unwrap_or_else(|_| vec![0.0; rows])
    };

    let cancel = z("cancel_to_received_ratio");
    let imbalance = z("order_flow_imbalance");
    let size = z("size");
    let deviation = match (table.numeric("size"), size_rolling_mean(table)) {
        (Ok(size), Some(mean)) => {
            let raw: Vec<f64> = size.iter().zip(&mean).map(|(s, m)| s - m).collect();
            standardize(&raw)
        }
        _ => vec![0.0; rows],
    };

    (0..rows)
        .map(|i| {
            sigmoid(
                weights.cancellation_ratio * cancel[i]
                    + weights.order_flow_imbalance * imbalance[i].abs()
                    + weights.size * size[i]
                    + weights.rolling_stats * deviation[i],
            )
        })
        .collect()
}
