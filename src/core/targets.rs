use crate::models::Direction;

/// Price at `rr` multiples of the stop distance, on the profitable side of entry.
pub fn target_price(direction: Direction, entry: f64, stop: f64, rr: f64) -> f64 {
    let risk = (entry - stop).abs();
    match direction {
        Direction::Buy => entry + risk * rr,
        Direction::Sell => entry - risk * rr,
    }
}

/// Target when entry, stop and rr are all known.
pub fn optional_target(
    direction: Direction,
    entry: Option<f64>,
    stop: Option<f64>,
    rr: Option<f64>,
) -> Option<f64> {
    Some(target_price(direction, entry?, stop?, rr?))
}
