pub mod chart;
pub mod config;
pub mod core;
pub mod error;
pub mod journal;
pub mod models;
pub mod price_source;
pub mod store;
#[cfg(test)]
pub mod test_helpers;
