//! Feature extraction over processed CSV captures on disk

use std::fs;
use std::path::PathBuf;

use lobppo::config::AppConfig;
use lobppo::data::EventTable;
use lobppo::features::{extract_features, RollingOp};

fn workspace() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lobppo_extract_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn config_in(dir: &PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    config.paths.full_channel_processed = dir.join("processed/full_channel.csv");
    config.paths.ticker_processed = dir.join("processed/ticker.csv");
    config.paths.full_channel_enhanced = dir.join("enhanced/full_channel.csv");
    config.paths.ticker_enhanced = dir.join("enhanced/ticker.csv");
    config.features.rolling_windows = vec![1, 3];
    config.features.operations = vec![RollingOp::Mean];
    config.features.hours = vec![9, 10];
    config.features.order_flow_window = 2;
    config
}

fn write(path: &PathBuf, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_inputs(config: &AppConfig) {
    write(
        &config.paths.full_channel_processed,
        "price,size,side_buy,reason_canceled,type_received,hour_of_day\n\
         10,1,1,0,1,9\n\
         20,2,0,1,0,9\n\
         30,6,1,1,2,10\n",
    );
    write(
        &config.paths.ticker_processed,
        "best_bid,best_ask,last_size,time\n\
         99,101,3,2024-01-01T09:00:00Z\n\
         100,100.5,5,2024-01-01T10:30:00Z\n",
    );
}

fn column(table: &EventTable, name: &str) -> Vec<f64> {
    table
        .numeric(name)
        .unwrap_or_else(|e| panic!("column {name}: {e}"))
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

#[test]
fn test_three_row_capture_matches_hand_computed_features() {
    let dir = workspace();
    let config = config_in(&dir);
    write_inputs(&config);

    let summary = extract_features(&config).unwrap();
    assert_eq!(summary.full_channel_rows, 3);
    assert_eq!(summary.ticker_rows, 2);

    let full = EventTable::read_csv(&config.paths.full_channel_enhanced).unwrap();
    assert_close(&column(&full, "price_1_mean"), &[10.0, 20.0, 30.0]);
    assert_close(&column(&full, "price_3_mean"), &[10.0, 15.0, 20.0]);
    assert_close(&column(&full, "size_1_mean"), &[1.0, 2.0, 6.0]);
    assert_close(&column(&full, "size_3_mean"), &[1.0, 1.5, 3.0]);

    assert_close(&column(&full, "signed_size"), &[1.0, -2.0, 6.0]);
    assert_close(&column(&full, "order_flow_imbalance"), &[1.0, -1.0, 4.0]);
    assert_close(&column(&full, "cancel_to_received_ratio"), &[0.0, 1.0, 0.5]);
    assert_close(&column(&full, "hour_9"), &[1.0, 1.0, 0.0]);
    assert_close(&column(&full, "hour_10"), &[0.0, 0.0, 1.0]);
    assert!(!full.has_column("price_3_std"));

    let ticker = EventTable::read_csv(&config.paths.ticker_enhanced).unwrap();
    assert_close(&column(&ticker, "spread"), &[2.0, 0.5]);
    assert_close(&column(&ticker, "last_size_3_mean"), &[3.0, 4.0]);
    assert_close(&column(&ticker, "hour_of_day"), &[9.0, 10.0]);
    assert_close(&column(&ticker, "hour_9"), &[1.0, 0.0]);
    assert_close(&column(&ticker, "hour_10"), &[0.0, 1.0]);
    assert_eq!(summary.ticker_columns, ticker.num_columns());

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_missing_input_columns_skip_only_their_features() {
    let dir = workspace();
    let config = config_in(&dir);
    write(
        &config.paths.full_channel_processed,
        "price,size,side_buy,hour_of_day\n10,1,1,9\n20,2,0,10\n",
    );
    write(
        &config.paths.ticker_processed,
        "best_bid,best_ask,last_size,hour_of_day\n99,101,3,9\n",
    );

    extract_features(&config).unwrap();

    let full = EventTable::read_csv(&config.paths.full_channel_enhanced).unwrap();
    assert!(full.has_column("price_3_mean"));
    assert!(full.has_column("order_flow_imbalance"));
    assert!(!full.has_column("cancel_to_received_ratio"));
    assert!(full.has_column("hour_10"));

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_header_only_capture_writes_derived_schema() {
    let dir = workspace();
    let config = config_in(&dir);
    write(
        &config.paths.full_channel_processed,
        "price,size,side_buy,reason_canceled,type_received,hour_of_day\n",
    );
    write(
        &config.paths.ticker_processed,
        "best_bid,best_ask,last_size,time\n",
    );

    let summary = extract_features(&config).unwrap();
    assert_eq!(summary.full_channel_rows, 0);
    assert_eq!(summary.ticker_rows, 0);

    let full = EventTable::read_csv(&config.paths.full_channel_enhanced).unwrap();
    assert_eq!(full.num_rows(), 0);
    for name in [
        "price_1_mean",
        "price_3_mean",
        "size_3_mean",
        "signed_size",
        "order_flow_imbalance",
        "cancel_to_received_ratio",
        "hour_9",
        "hour_10",
    ] {
        assert!(full.has_column(name), "missing {name}");
    }

    let ticker = EventTable::read_csv(&config.paths.ticker_enhanced).unwrap();
    assert_eq!(ticker.num_rows(), 0);
    for name in ["spread", "last_size_1_mean", "hour_of_day", "hour_9", "hour_10"] {
        assert!(ticker.has_column(name), "missing {name}");
    }

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_missing_input_file_is_fatal() {
    let dir = workspace();
    let config = config_in(&dir);

    assert!(extract_features(&config).is_err());

    fs::remove_dir_all(dir).ok();
}
