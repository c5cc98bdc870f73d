use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JournalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            other => Err(JournalError::validation(format!(
                "direction must be BUY or SELL, got {:?}",
                other
            ))),
        }
    }
}

/// Directional bias read off a single timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Up,
    Down,
    Range,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Up => "UP",
            Bias::Down => "DOWN",
            Bias::Range => "RANGE",
        }
    }

    pub fn is_directional(self) -> bool {
        self != Bias::Range
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Bias::Up),
            "DOWN" => Ok(Bias::Down),
            "RANGE" => Ok(Bias::Range),
            other => Err(JournalError::validation(format!(
                "bias must be UP, DOWN or RANGE, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Open,
    Win,
    Loss,
    #[serde(rename = "BE")]
    Breakeven,
}

impl TradeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeResult::Open => "OPEN",
            TradeResult::Win => "WIN",
            TradeResult::Loss => "LOSS",
            TradeResult::Breakeven => "BE",
        }
    }

    /// Closed trades count towards win-rate denominators.
    pub fn is_closed(self) -> bool {
        self != TradeResult::Open
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TradeResult {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(TradeResult::Open),
            "WIN" => Ok(TradeResult::Win),
            "LOSS" => Ok(TradeResult::Loss),
            "BE" | "BREAKEVEN" => Ok(TradeResult::Breakeven),
            other => Err(JournalError::validation(format!(
                "result must be OPEN, WIN, LOSS or BE, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Session {
    Asia,
    London,
    NewYork,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Asia => "Asia",
            Session::London => "London",
            Session::NewYork => "NewYork",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Session {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asia" => Ok(Session::Asia),
            "london" => Ok(Session::London),
            "newyork" | "new_york" | "ny" => Ok(Session::NewYork),
            other => Err(JournalError::validation(format!(
                "unknown session {:?}",
                other
            ))),
        }
    }
}
