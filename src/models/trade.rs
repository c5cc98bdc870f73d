use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::alignment::score_alignment;
use crate::core::targets::optional_target;
use crate::error::{JournalError, Result};
use crate::models::{Bias, ConditionRef, Direction, Session, TradeResult};

/// A persisted journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub symbol: String,
    pub direction: Direction,
    /// Wall-clock time in the journal timezone.
    pub entry_time: NaiveDateTime,
    pub rr: f64,
    pub session: Session,
    pub h4: Bias,
    pub h1: Bias,
    pub m15: Bias,
    pub mtf_score: u8,
    pub result: TradeResult,
    pub notes: String,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub exit_price: Option<f64>,
}

impl Trade {
    pub fn target_price(&self) -> Option<f64> {
        optional_target(self.direction, self.entry_price, self.stop_price, Some(self.rr))
    }
}

/// Raw fields as a user enters them.
#[derive(Debug, Clone)]
pub struct TradeForm {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub rr: f64,
    pub h4: Bias,
    pub h1: Bias,
    pub m15: Bias,
    pub result: TradeResult,
    pub notes: String,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub exit_price: Option<f64>,
    /// Labels of the checked conditions.
    pub conditions: Vec<String>,
}

/// Store input: a validated form with its derived fields filled in.
///
/// Only [`TradeForm::derive`] builds one, so `session` and `mtf_score` always
/// agree with `entry_time` and the three biases.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub rr: f64,
    pub h4: Bias,
    pub h1: Bias,
    pub m15: Bias,
    pub result: TradeResult,
    pub notes: String,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub exit_price: Option<f64>,
    session: Session,
    mtf_score: u8,
}

impl NewTrade {
    pub fn session(&self) -> Session {
        self.session
    }

    pub fn mtf_score(&self) -> u8 {
        self.mtf_score
    }
}

impl TradeForm {
    pub fn derive(self) -> Result<(NewTrade, Vec<ConditionRef>)> {
        let symbol = self.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(JournalError::validation("symbol is required"));
        }
        if !(self.rr.is_finite() && self.rr > 0.0) {
            return Err(JournalError::validation(format!(
                "risk:reward must be a positive number, got {}",
                self.rr
            )));
        }
        for (name, price) in [
            ("entry price", self.entry_price),
            ("stop price", self.stop_price),
            ("exit price", self.exit_price),
        ] {
            if let Some(p) = price {
                check_price(name, p)?;
            }
        }

        let mut conditions: Vec<ConditionRef> = Vec::with_capacity(self.conditions.len());
        for label in &self.conditions {
            let cond = ConditionRef::from_label(label)?;
            if !conditions.iter().any(|c| c.key == cond.key) {
                conditions.push(cond);
            }
        }

        let trade = NewTrade {
            session: Session::from_entry(&self.entry_time),
            mtf_score: score_alignment(self.h4, self.h1, self.m15),
            symbol,
            direction: self.direction,
            entry_time: self.entry_time,
            rr: self.rr,
            h4: self.h4,
            h1: self.h1,
            m15: self.m15,
            result: self.result,
            notes: self.notes.trim().to_string(),
            entry_price: self.entry_price,
            stop_price: self.stop_price,
            exit_price: self.exit_price,
        };
        Ok((trade, conditions))
    }
}

pub(crate) fn check_price(name: &str, price: f64) -> Result<()> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(JournalError::validation(format!(
            "{} must be a positive number, got {}",
            name, price
        )))
    }
}
