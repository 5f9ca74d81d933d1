//! Feature Engineering
//!
//! Offline pass that turns processed full channel and ticker captures into
//! the enhanced tables replayed by the market environment.

pub mod extract;
pub mod rolling;

pub use extract::{
    add_cancellation_ratio, calculate_order_flow_imbalance, calculate_rolling_stats,
    encode_hour_of_day, extract_features, extract_full_channel_features,
    extract_ticker_features, market_spread, rolling_column_name, ExtractionSummary,
};
pub use rolling::RollingOp;
