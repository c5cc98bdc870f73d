pub mod candle;
pub mod checklist;
pub mod direction;
pub mod trade;

pub use candle::{Candle, CandleSeries};
pub use checklist::{condition_key, ChecklistItem, ConditionRef, DEFAULT_CONDITIONS};
pub use direction::*;
pub use trade::{NewTrade, Trade, TradeForm};
