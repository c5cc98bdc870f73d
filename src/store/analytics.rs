use rusqlite::params;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::Session;
use crate::store::TradeStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionWinrate {
    pub session: Session,
    pub winrate: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionWinrate {
    pub session: Session,
    pub label: String,
    pub winrate: f64,
    pub trade_count: usize,
}

fn winrate(wins: i64, total: i64) -> f64 {
    if total > 0 {
        wins as f64 / total as f64
    } else {
        0.0
    }
}

// OPEN trades have no outcome yet and never enter a denominator.
impl TradeStore {
    pub fn aggregate_winrate_by_session(&self) -> Result<Vec<SessionWinrate>> {
        let mut stmt = self.conn().prepare(
            "SELECT session,
                    SUM(CASE WHEN result = 'WIN' THEN 1 ELSE 0 END) AS wins,
                    COUNT(*) AS trades
             FROM trade
             WHERE result IN ('WIN', 'LOSS', 'BE')
             GROUP BY session",
        )?;
        let mut rows = stmt
            .query_map([], |row| {
                let session: Session = row.get(0)?;
                let wins: i64 = row.get(1)?;
                let trades: i64 = row.get(2)?;
                Ok(SessionWinrate {
                    session,
                    winrate: winrate(wins, trades),
                    trade_count: trades as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.sort_by_key(|r| r.session);
        debug!("Session winrate over {} sessions", rows.len());
        Ok(rows)
    }

    /// Win-rate per (session, condition), best first, for groups with at
    /// least `min_trades` closed trades.
    pub fn aggregate_winrate_by_condition(
        &self,
        min_trades: usize,
    ) -> Result<Vec<ConditionWinrate>> {
        let mut stmt = self.conn().prepare(
            "SELECT t.session,
                    ci.label,
                    SUM(CASE WHEN t.result = 'WIN' THEN 1 ELSE 0 END) AS wins,
                    COUNT(*) AS trades
             FROM trade_checklist tc
             JOIN trade t ON t.id = tc.trade_id
             JOIN checklist_item ci ON ci.id = tc.item_id
             WHERE tc.checked = 1 AND t.result IN ('WIN', 'LOSS', 'BE')
             GROUP BY t.session, ci.id
             HAVING COUNT(*) >= ?1
             ORDER BY CAST(SUM(CASE WHEN t.result = 'WIN' THEN 1 ELSE 0 END) AS REAL) / COUNT(*) DESC,
                      COUNT(*) DESC,
                      ci.label",
        )?;
        let rows = stmt
            .query_map(params![min_trades as i64], |row| {
                let wins: i64 = row.get(2)?;
                let trades: i64 = row.get(3)?;
                Ok(ConditionWinrate {
                    session: row.get(0)?,
                    label: row.get(1)?,
                    winrate: winrate(wins, trades),
                    trade_count: trades as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(
            "Condition winrate: {} groups with >= {} trades",
            rows.len(),
            min_trades
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeResult;
    use crate::test_helpers::{at, sample_form};

    fn log(store: &mut TradeStore, hour: u32, result: TradeResult, conditions: &[&str]) {
        let mut form = sample_form();
        form.entry_time = at(2024, 6, 3, hour, 0);
        form.result = result;
        form.conditions = conditions.iter().map(|c| c.to_string()).collect();
        let (nt, conds) = form.derive().unwrap();
        store.record_trade(&nt, &conds).unwrap();
    }

    #[test]
    fn open_trades_are_excluded_from_session_winrate() {
        let mut s = TradeStore::open_in_memory().unwrap();
        log(&mut s, 9, TradeResult::Win, &[]);
        log(&mut s, 10, TradeResult::Win, &[]);
        log(&mut s, 11, TradeResult::Loss, &[]);
        log(&mut s, 12, TradeResult::Open, &[]);

        let rows = s.aggregate_winrate_by_session().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session, Session::London);
        assert_eq!(rows[0].trade_count, 3);
        assert!((rows[0].winrate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn breakeven_counts_in_the_denominator() {
        let mut s = TradeStore::open_in_memory().unwrap();
        log(&mut s, 2, TradeResult::Win, &[]);
        log(&mut s, 3, TradeResult::Breakeven, &[]);
        log(&mut s, 20, TradeResult::Loss, &[]);

        let rows = s.aggregate_winrate_by_session().unwrap();
        let sessions: Vec<Session> = rows.iter().map(|r| r.session).collect();
        assert_eq!(sessions, vec![Session::Asia, Session::NewYork]);
        assert!((rows[0].winrate - 0.5).abs() < 1e-9);
        assert_eq!(rows[1].winrate, 0.0);
    }

    #[test]
    fn only_open_trades_yield_no_rows() {
        let mut s = TradeStore::open_in_memory().unwrap();
        log(&mut s, 9, TradeResult::Open, &["BOS/CHOCH"]);
        assert!(s.aggregate_winrate_by_session().unwrap().is_empty());
        assert!(s.aggregate_winrate_by_condition(1).unwrap().is_empty());
    }

    #[test]
    fn thin_conditions_are_filtered_out() {
        let mut s = TradeStore::open_in_memory().unwrap();
        log(&mut s, 9, TradeResult::Win, &["BOS/CHOCH", "Volume spike"]);
        log(&mut s, 10, TradeResult::Loss, &["BOS/CHOCH", "Volume spike"]);
        log(&mut s, 11, TradeResult::Win, &["BOS/CHOCH"]);

        let rows = s.aggregate_winrate_by_condition(3).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "BOS/CHOCH");
        assert_eq!(rows[0].trade_count, 3);
        assert!((rows[0].winrate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn conditions_rank_by_winrate() {
        let mut s = TradeStore::open_in_memory().unwrap();
        for (hour, result) in [
            (9, TradeResult::Win),
            (10, TradeResult::Win),
            (11, TradeResult::Loss),
        ] {
            log(&mut s, hour, result, &["FVG retracement"]);
        }
        for hour in [12, 13, 14] {
            log(&mut s, hour, TradeResult::Win, &["Asia range liquidity sweep"]);
        }

        let rows = s.aggregate_winrate_by_condition(3).unwrap();
        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Asia range liquidity sweep", "FVG retracement"]);
        assert_eq!(rows[0].winrate, 1.0);
    }

    #[test]
    fn condition_groups_split_by_session() {
        let mut s = TradeStore::open_in_memory().unwrap();
        for hour in [1, 2, 3] {
            log(&mut s, hour, TradeResult::Loss, &["BOS/CHOCH"]);
        }
        for hour in [9, 10] {
            log(&mut s, hour, TradeResult::Win, &["BOS/CHOCH"]);
        }
        let rows = s.aggregate_winrate_by_condition(3).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session, Session::Asia);
        assert_eq!(rows[0].winrate, 0.0);
    }
}
