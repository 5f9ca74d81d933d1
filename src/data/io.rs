use std::path::Path;

use tracing::info;

use super::table::EventTable;
use crate::error::Result;

/// Load the processed full-channel and ticker tables together
pub fn load_csv_data<P: AsRef<Path>, Q: AsRef<Path>>(
    full_channel_path: P,
    ticker_path: Q,
) -> Result<(EventTable, EventTable)> {
    let full_channel = EventTable::read_csv(full_channel_path.as_ref())?;
    info!(
        "Loaded {} full channel rows from {:?}",
        full_channel.num_rows(),
        full_channel_path.as_ref()
    );

    let ticker = EventTable::read_csv(ticker_path.as_ref())?;
    info!(
        "Loaded {} ticker rows from {:?}",
        ticker.num_rows(),
        ticker_path.as_ref()
    );

    Ok((full_channel, ticker))
}

/// Save the enhanced full-channel and ticker tables together
pub fn save_data<P: AsRef<Path>, Q: AsRef<Path>>(
    full_channel: &EventTable,
    ticker: &EventTable,
    full_channel_path: P,
    ticker_path: Q,
) -> Result<()> {
    full_channel.write_csv(full_channel_path.as_ref())?;
    info!("Saved full channel data to {:?}", full_channel_path.as_ref());

    ticker.write_csv(ticker_path.as_ref())?;
    info!("Saved ticker data to {:?}", ticker_path.as_ref());

    Ok(())
}
