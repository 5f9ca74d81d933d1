//! Feature engineering over full channel and ticker event tables
//!
//! Each transform takes the table by value and hands it back with new
//! columns appended. A transform that fails logs the error and returns the
//! table without the affected column(s); only loading and saving at the
//! pipeline boundary are fatal.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::rolling::{rolling_sum, RollingOp};
use crate::config::{AppConfig, FeatureConfig};
use crate::data::{load_csv_data, save_data, Column, EventTable};
use crate::error::{LobError, Result};

/// Shape of the tables written by [`extract_features`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub full_channel_rows: usize,
    pub full_channel_columns: usize,
    pub ticker_rows: usize,
    pub ticker_columns: usize,
}

/// Name of a derived rolling-statistic column
pub fn rolling_column_name(column: &str, window: usize, op: RollingOp) -> String {
    format!("{column}_{window}_{op}")
}

/// Add `{column}_{window}_{op}` for every configured window and operation
pub fn calculate_rolling_stats(
    mut data: EventTable,
    column: &str,
    config: &FeatureConfig,
) -> EventTable {
    for &window in &config.rolling_windows {
        for &op in &config.operations {
            let target = rolling_column_name(column, window, op);
            let result = data
                .numeric(column)
                .and_then(|values| op.apply(&values, window))
                .and_then(|derived| data.set_column(target.clone(), Column::Float(derived)));
            if let Err(e) = result {
                error!("Error calculating {} for {}: {}", op, target, e);
            }
        }
    }
    data
}

fn signed_sizes(data: &EventTable) -> Result<Vec<f64>> {
    let size = data.numeric("size")?;
    let side_buy = data.numeric("side_buy")?;
    Ok(size
        .iter()
        .zip(&side_buy)
        .map(|(&s, &buy)| if buy == 1.0 { s } else { -s })
        .collect())
}

/// Add `signed_size` and its trailing sum `order_flow_imbalance`
pub fn calculate_order_flow_imbalance(mut data: EventTable, config: &FeatureConfig) -> EventTable {
    let result = signed_sizes(&data).and_then(|signed| {
        let imbalance = rolling_sum(&signed, config.order_flow_window)?;
        data.set_column("signed_size", Column::Float(signed))?;
        data.set_column("order_flow_imbalance", Column::Float(imbalance))
    });
    if let Err(e) = result {
        error!("Error calculating order flow imbalance: {}", e);
    }
    data
}

/// Add `cancel_to_received_ratio`; a zero received count divides by one
pub fn add_cancellation_ratio(mut data: EventTable) -> EventTable {
    let result = data
        .numeric("reason_canceled")
        .and_then(|canceled| Ok((canceled, data.numeric("type_received")?)))
        .and_then(|(canceled, received)| {
            let ratio = canceled
                .iter()
                .zip(&received)
                .map(|(&c, &r)| c / if r == 0.0 { 1.0 } else { r })
                .collect();
            data.set_column("cancel_to_received_ratio", Column::Float(ratio))
        });
    if let Err(e) = result {
        error!("Error adding cancellation ratio: {}", e);
    }
    data
}

/// Add `spread = best_ask - best_bid`
pub fn market_spread(mut data: EventTable) -> EventTable {
    let result = data
        .numeric("best_ask")
        .and_then(|ask| Ok((ask, data.numeric("best_bid")?)))
        .and_then(|(ask, bid)| {
            let spread = ask.iter().zip(&bid).map(|(a, b)| a - b).collect();
            data.set_column("spread", Column::Float(spread))
        });
    if let Err(e) = result {
        error!("Error calculating market spread: {}", e);
    }
    data
}

/// Hour of day per row, from `hour_of_day` or else from an RFC 3339 `time` column
fn hours_of_day(data: &mut EventTable) -> Result<Vec<Option<i64>>> {
    if data.has_column("hour_of_day") {
        let hours = data.numeric("hour_of_day")?;
        return Ok(hours
            .into_iter()
            .map(|h| if h.is_finite() { Some(h.trunc() as i64) } else { None })
            .collect());
    }

    let derived: Vec<Option<i64>> = match data.column("time") {
        Some(column) if column.is_empty() => Vec::new(),
        Some(Column::Text(times)) => times
            .iter()
            .map(|t| {
                DateTime::parse_from_rfc3339(t)
                    .ok()
                    .map(|ts| ts.with_timezone(&Utc).hour() as i64)
            })
            .collect(),
        Some(_) => return Err(LobError::column_type("time", "RFC 3339 text")),
        None => return Err(LobError::missing_column("hour_of_day")),
    };

    let column = derived
        .iter()
        .map(|h| h.map(|h| h as f64).unwrap_or(f64::NAN))
        .collect();
    data.set_column("hour_of_day", Column::Float(column))?;
    Ok(derived)
}

/// One-hot encode `hour_of_day` into the predeclared `hour_{h}` columns.
///
/// Every predeclared column is written even when no row has that hour, and
/// an hour outside the predeclared set leaves the row all zeros. Without a
/// usable hour source every predeclared column is written as zeros.
pub fn encode_hour_of_day(mut data: EventTable, config: &FeatureConfig) -> EventTable {
    let rows = data.num_rows();
    let result = hours_of_day(&mut data).and_then(|hours| {
        let slots: HashMap<i64, usize> = config
            .hours
            .iter()
            .enumerate()
            .map(|(slot, &h)| (h as i64, slot))
            .collect();

        let mut indicators = vec![vec![0i64; rows]; config.hours.len()];
        for (row, hour) in hours.iter().enumerate() {
            if let Some(&slot) = hour.as_ref().and_then(|h| slots.get(h)) {
                indicators[slot][row] = 1;
            }
        }

        for (name, values) in config.hour_columns().into_iter().zip(indicators) {
            data.set_column(name, Column::Int(values))?;
        }
        Ok(())
    });
    if let Err(e) = result {
        error!("Error encoding hour of day: {}", e);
        for name in config.hour_columns() {
            if !data.has_column(&name) {
                let _ = data.set_column(name, Column::Int(vec![0; rows]));
            }
        }
    }
    data
}

/// Engineer features of the full channel table.
///
/// A table without rows comes back with the derived columns at length 0.
pub fn extract_full_channel_features(data: EventTable, config: &FeatureConfig) -> EventTable {
    info!("Extracting full channel features...");
    let data = calculate_rolling_stats(data, "price", config);
    let data = calculate_rolling_stats(data, "size", config);
    let data = calculate_order_flow_imbalance(data, config);
    let data = add_cancellation_ratio(data);
    encode_hour_of_day(data, config)
}

/// Engineer features of the ticker table
pub fn extract_ticker_features(data: EventTable, config: &FeatureConfig) -> EventTable {
    info!("Extracting ticker features...");
    let data = market_spread(data);
    let data = calculate_rolling_stats(data, "last_size", config);
    encode_hour_of_day(data, config)
}

/// Load both processed tables, enhance them and save both enhanced tables
pub fn extract_features(config: &AppConfig) -> Result<ExtractionSummary> {
    let paths = &config.paths;

    info!("Loading processed data...");
    let (full_channel, ticker) =
        load_csv_data(&paths.full_channel_processed, &paths.ticker_processed).map_err(|e| {
            error!("An error occurred while loading data. {}", e);
            e
        })?;

    info!("Extracting features for full channel data...");
    let full_channel_enhanced = extract_full_channel_features(full_channel, &config.features);

    info!("Extracting features for ticker data...");
    let ticker_enhanced = extract_ticker_features(ticker, &config.features);

    info!("Saving enhanced datasets...");
    save_data(
        &full_channel_enhanced,
        &ticker_enhanced,
        &paths.full_channel_enhanced,
        &paths.ticker_enhanced,
    )
    .map_err(|e| {
        error!("An error occurred while saving data. {}", e);
        e
    })?;

    info!("Feature engineering complete and files saved.");
    Ok(ExtractionSummary {
        full_channel_rows: full_channel_enhanced.num_rows(),
        full_channel_columns: full_channel_enhanced.num_columns(),
        ticker_rows: ticker_enhanced.num_rows(),
        ticker_columns: ticker_enhanced.num_columns(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(windows: Vec<usize>, operations: Vec<RollingOp>) -> FeatureConfig {
        FeatureConfig {
            rolling_windows: windows,
            operations,
            ..FeatureConfig::default()
        }
    }

    fn floats(table: &EventTable, name: &str) -> Vec<f64> {
        table.numeric(name).unwrap()
    }

    fn ints(table: &EventTable, name: &str) -> Vec<i64> {
        match table.column(name) {
            Some(Column::Int(v)) => v.clone(),
            other => panic!("{name} is not an int column: {other:?}"),
        }
    }

    #[test]
    fn test_rolling_stats_names_and_values() {
        let table =
            EventTable::from_columns([("price", Column::Float(vec![1.0, 2.0, 4.0]))]).unwrap();
        let config = features(vec![2], vec![RollingOp::Mean, RollingOp::Var]);

        let out = calculate_rolling_stats(table, "price", &config);

        assert_eq!(floats(&out, "price_2_mean"), vec![1.0, 1.5, 3.0]);
        assert_eq!(floats(&out, "price_2_var"), vec![0.5, 0.5, 2.0]);
    }

    #[test]
    fn test_rolling_stats_failure_is_per_pair() {
        let table = EventTable::from_columns([("size", Column::Int(vec![1, 2, 3]))]).unwrap();
        let config = features(vec![0, 2], vec![RollingOp::Mean]);

        let out = calculate_rolling_stats(table, "size", &config);

        assert!(!out.has_column("size_0_mean"));
        assert!(out.has_column("size_2_mean"));
    }

    #[test]
    fn test_rolling_stats_missing_column_leaves_table() {
        let table = EventTable::from_columns([("size", Column::Int(vec![1]))]).unwrap();
        let out = calculate_rolling_stats(table.clone(), "price", &FeatureConfig::default());
        assert_eq!(out, table);
    }

    #[test]
    fn test_order_flow_imbalance() {
        let size: Vec<f64> = (1..=12).map(f64::from).collect();
        let side: Vec<bool> = (0..12).map(|i| i % 3 != 0).collect();
        let table = EventTable::from_columns([
            ("size", Column::Float(size.clone())),
            ("side_buy", Column::Bool(side.clone())),
        ])
        .unwrap();

        let out = calculate_order_flow_imbalance(table, &FeatureConfig::default());

        let signed: Vec<f64> = size
            .iter()
            .zip(&side)
            .map(|(s, b)| if *b { *s } else { -s })
            .collect();
        assert_eq!(floats(&out, "signed_size"), signed);

        let imbalance = floats(&out, "order_flow_imbalance");
        for i in 0..12usize {
            let start = (i + 1).saturating_sub(10);
            let expected: f64 = signed[start..=i].iter().sum();
            assert_eq!(imbalance[i], expected, "row {i}");
        }
    }

    #[test]
    fn test_order_flow_imbalance_missing_side() {
        let table = EventTable::from_columns([("size", Column::Float(vec![1.0]))]).unwrap();
        let out = calculate_order_flow_imbalance(table.clone(), &FeatureConfig::default());
        assert_eq!(out, table);
    }

    #[test]
    fn test_cancellation_ratio_never_divides_by_zero() {
        let table = EventTable::from_columns([
            ("reason_canceled", Column::Int(vec![1, 0, 1, 3])),
            ("type_received", Column::Int(vec![0, 0, 2, 4])),
        ])
        .unwrap();

        let out = add_cancellation_ratio(table);

        let ratio = floats(&out, "cancel_to_received_ratio");
        assert_eq!(ratio, vec![1.0, 0.0, 0.5, 0.75]);
        assert!(ratio.iter().all(|r| r.is_finite()));
        assert!(!out.has_column("type_received_adjusted"));
        assert_eq!(out.num_columns(), 3);
    }

    #[test]
    fn test_market_spread() {
        let table = EventTable::from_columns([
            ("best_bid", Column::Float(vec![99.5, 100.0])),
            ("best_ask", Column::Float(vec![100.0, 100.75])),
        ])
        .unwrap();

        let out = market_spread(table);
        assert_eq!(floats(&out, "spread"), vec![0.5, 0.75]);
    }

    #[test]
    fn test_hour_encoding_fixed_schema() {
        let table =
            EventTable::from_columns([("hour_of_day", Column::Float(vec![3.0, 23.0, 7.0]))])
                .unwrap();
        let config = FeatureConfig {
            hours: vec![3, 7],
            ..FeatureConfig::default()
        };

        let out = encode_hour_of_day(table, &config);

        assert_eq!(ints(&out, "hour_3"), vec![1, 0, 0]);
        assert_eq!(ints(&out, "hour_7"), vec![0, 0, 1]);
        assert!(!out.has_column("hour_23"));
    }

    #[test]
    fn test_hour_encoding_one_hot_per_row() {
        let hours: Vec<i64> = vec![0, 5, 23, 12, 5];
        let table = EventTable::from_columns([("hour_of_day", Column::Int(hours.clone()))]).unwrap();
        let config = FeatureConfig::default();

        let out = encode_hour_of_day(table, &config);

        for (row, hour) in hours.iter().enumerate() {
            let hot: Vec<String> = config
                .hour_columns()
                .into_iter()
                .filter(|c| ints(&out, c)[row] == 1)
                .collect();
            assert_eq!(hot, vec![format!("hour_{hour}")]);
        }
    }

    #[test]
    fn test_hour_derived_from_timestamp() {
        let table = EventTable::from_columns([(
            "time",
            Column::Text(vec![
                "2024-03-01T14:05:00.123456Z".to_string(),
                "not a timestamp".to_string(),
            ]),
        )])
        .unwrap();

        let out = encode_hour_of_day(table, &FeatureConfig::default());

        assert_eq!(ints(&out, "hour_14"), vec![1, 0]);
        let hour = floats(&out, "hour_of_day");
        assert_eq!(hour[0], 14.0);
        assert!(hour[1].is_nan());
    }

    #[test]
    fn test_header_only_table_keeps_derived_schema() {
        let config = features(vec![2], vec![RollingOp::Mean, RollingOp::Std]);
        let empty = |names: &[&str]| {
            EventTable::from_columns(names.iter().map(|n| (*n, Column::Int(Vec::new())))).unwrap()
        };

        let full = extract_full_channel_features(
            empty(&["price", "size", "side_buy", "reason_canceled", "type_received", "hour_of_day"]),
            &config,
        );
        assert_eq!(full.num_rows(), 0);
        for name in [
            "price_2_mean",
            "size_2_std",
            "signed_size",
            "order_flow_imbalance",
            "cancel_to_received_ratio",
            "hour_0",
            "hour_23",
        ] {
            assert!(full.has_column(name), "missing {name}");
        }

        let ticker = extract_ticker_features(
            empty(&["best_bid", "best_ask", "last_size", "time"]),
            &config,
        );
        assert_eq!(ticker.num_rows(), 0);
        assert!(ticker.has_column("spread"));
        assert!(ticker.has_column("last_size_2_mean"));
        assert!(ticker.has_column("hour_of_day"));
        assert!(ticker.has_column("hour_12"));
    }

    #[test]
    fn test_missing_hour_source_writes_zero_hour_columns() {
        let table = EventTable::from_columns([("price", Column::Float(vec![1.0, 2.0]))]).unwrap();
        let config = FeatureConfig {
            hours: vec![9, 10],
            ..FeatureConfig::default()
        };

        let out = encode_hour_of_day(table, &config);

        assert_eq!(ints(&out, "hour_9"), vec![0, 0]);
        assert_eq!(ints(&out, "hour_10"), vec![0, 0]);
        assert!(!out.has_column("hour_of_day"));
    }
}
