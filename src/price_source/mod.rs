pub mod csv_file;
pub mod historical;
pub mod yahoo;

pub use csv_file::{import_csv, CsvSource, ImportSummary};
pub use historical::HistoricalSource;
pub use yahoo::YahooSource;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{JournalError, Result};
use crate::models::CandleSeries;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Bars for `symbol` from `center - minutes_before` to
    /// `center + minutes_after`, both ends included, oldest first.
    async fn get_window(
        &mut self,
        symbol: &str,
        center: DateTime<Utc>,
        minutes_before: i64,
        minutes_after: i64,
    ) -> Result<CandleSeries>;
}

pub fn window_bounds(
    center: DateTime<Utc>,
    minutes_before: i64,
    minutes_after: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        center - Duration::minutes(minutes_before),
        center + Duration::minutes(minutes_after),
    )
}

/// Earliest instant showing `naive` on a clock in `tz`.
pub fn from_wall_clock(naive: &NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            JournalError::validation(format!("{} does not exist in {}", naive, tz.name()))
        })
}
