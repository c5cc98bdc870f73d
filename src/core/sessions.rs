use chrono::{NaiveDateTime, NaiveTime, Timelike};

use crate::models::Session;

const LONDON_OPEN_HOUR: u32 = 8;
const NEW_YORK_OPEN_HOUR: u32 = 16;

/// Buckets a wall-clock time into a trading session.
///
/// Intervals are half-open, so a boundary belongs to the later session:
/// [00:00, 08:00) Asia, [08:00, 16:00) London, [16:00, 24:00) NewYork.
pub fn classify_session(time: NaiveTime) -> Session {
    match time.hour() {
        h if h < LONDON_OPEN_HOUR => Session::Asia,
        h if h < NEW_YORK_OPEN_HOUR => Session::London,
        _ => Session::NewYork,
    }
}

impl Session {
    /// Date and timezone are ignored; only the clock reading matters.
    pub fn from_entry(entry_time: &NaiveDateTime) -> Self {
        classify_session(entry_time.time())
    }
}
