pub mod analytics;
mod columns;

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{JournalError, Result};
use crate::models::trade::check_price;
use crate::models::{ChecklistItem, ConditionRef, NewTrade, Trade, TradeResult};

pub use analytics::{ConditionWinrate, SessionWinrate};

const TRADE_COLUMNS: &str = "id, symbol, direction, entry_time, rr, session, h4_dir, h1_dir, \
     m15_dir, mtf_score, result, notes, entry_price, stop_price, exit_price";

/// Outcome of a lookup-or-create on a checklist key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemInsert {
    Created(ChecklistItem),
    Existing(ChecklistItem),
}

impl ItemInsert {
    pub fn item(&self) -> &ChecklistItem {
        match self {
            ItemInsert::Created(item) | ItemInsert::Existing(item) => item,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, ItemInsert::Created(_))
    }
}

/// Handle to the journal database. Open one at startup and pass it to whoever
/// needs persistence.
pub struct TradeStore {
    conn: Connection,
}

impl TradeStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    JournalError::StoreUnavailable(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| JournalError::StoreUnavailable(format!("{}: {}", path.display(), e)))?;
        let store = Self::init(conn)?;
        info!("Trade store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| JournalError::StoreUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS trade (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL CHECK(direction IN ('BUY', 'SELL')),
                entry_time TEXT NOT NULL,
                rr REAL NOT NULL,
                session TEXT NOT NULL,
                h4_dir TEXT NOT NULL,
                h1_dir TEXT NOT NULL,
                m15_dir TEXT NOT NULL,
                mtf_score INTEGER NOT NULL CHECK(mtf_score BETWEEN 0 AND 3),
                result TEXT NOT NULL DEFAULT 'OPEN',
                notes TEXT NOT NULL DEFAULT '',
                entry_price REAL,
                stop_price REAL,
                exit_price REAL
            );

            CREATE TABLE IF NOT EXISTS checklist_item (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE CHECK(length(key) > 0),
                label TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trade_checklist (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_id INTEGER NOT NULL REFERENCES trade(id) ON DELETE CASCADE,
                item_id INTEGER NOT NULL REFERENCES checklist_item(id) ON DELETE CASCADE,
                checked INTEGER NOT NULL DEFAULT 1,
                UNIQUE(trade_id, item_id)
            );

            CREATE INDEX IF NOT EXISTS idx_trade_entry_time ON trade(entry_time);
            CREATE INDEX IF NOT EXISTS idx_trade_checklist_item ON trade_checklist(item_id);
            "#,
        )
        .map_err(|e| JournalError::StoreUnavailable(format!("schema setup failed: {}", e)))?;

        Ok(Self { conn })
    }

    pub fn create_trade(&self, trade: &NewTrade) -> Result<i64> {
        let id = insert_trade(&self.conn, trade)?;
        info!("Saved trade #{} {} {}", id, trade.symbol, trade.direction);
        Ok(id)
    }

    /// Finds or creates the item for `key`, then ties it to the trade.
    pub fn link_checklist(&self, trade_id: i64, key: &str, label: &str) -> Result<()> {
        let cond = ConditionRef {
            key: key.to_string(),
            label: label.to_string(),
        };
        link_condition(&self.conn, trade_id, &cond)
    }

    /// Trade plus its checklist links, committed together or not at all.
    pub fn record_trade(&mut self, trade: &NewTrade, conditions: &[ConditionRef]) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let id = insert_trade(&tx, trade)?;
        for cond in conditions {
            link_condition(&tx, id, cond)?;
        }
        tx.commit()?;
        info!(
            "Saved trade #{} {} {} with {} conditions",
            id,
            trade.symbol,
            trade.direction,
            conditions.len()
        );
        Ok(id)
    }

    pub fn get_trade(&self, id: i64) -> Result<Trade> {
        let sql = format!("SELECT {} FROM trade WHERE id = ?1", TRADE_COLUMNS);
        self.conn
            .query_row(&sql, params![id], trade_from_row)
            .optional()?
            .ok_or_else(|| JournalError::not_found("trade", id))
    }

    pub fn list_trades(&self, limit: usize, newest_first: bool) -> Result<Vec<Trade>> {
        let order = if newest_first { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM trade ORDER BY entry_time {order}, id {order} LIMIT ?1",
            TRADE_COLUMNS,
            order = order
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let trades = stmt
            .query_map(params![limit as i64], trade_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Listed {} trades", trades.len());
        Ok(trades)
    }

    pub fn trade_conditions(&self, trade_id: i64) -> Result<Vec<ChecklistItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT ci.id, ci.key, ci.label
             FROM trade_checklist tc
             JOIN checklist_item ci ON ci.id = tc.item_id
             WHERE tc.trade_id = ?1 AND tc.checked = 1
             ORDER BY ci.label",
        )?;
        let items = stmt
            .query_map(params![trade_id], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Records how a trade finished. Derived fields are left alone.
    pub fn update_outcome(
        &self,
        trade_id: i64,
        result: TradeResult,
        exit_price: Option<f64>,
    ) -> Result<()> {
        if let Some(p) = exit_price {
            check_price("exit price", p)?;
        }
        let changed = self.conn.execute(
            "UPDATE trade SET result = ?1, exit_price = COALESCE(?2, exit_price) WHERE id = ?3",
            params![result, exit_price, trade_id],
        )?;
        if changed == 0 {
            return Err(JournalError::not_found("trade", trade_id));
        }
        info!("Trade #{} marked {}", trade_id, result);
        Ok(())
    }

    pub fn list_checklist_items(&self) -> Result<Vec<ChecklistItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, key, label FROM checklist_item ORDER BY label")?;
        let items = stmt
            .query_map([], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Adds a condition unless its key already exists.
    pub fn add_checklist_item(&self, label: &str) -> Result<ItemInsert> {
        let cond = ConditionRef::from_label(label)?;
        let outcome = upsert_item(&self.conn, &cond)?;
        if !outcome.was_created() {
            warn!(
                "Checklist item {:?} already exists as {:?}",
                label,
                outcome.item().label
            );
        }
        Ok(outcome)
    }

    /// Removes an item together with every link that references it.
    pub fn delete_checklist_item(&self, id: i64) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM checklist_item WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(JournalError::not_found("checklist item", id));
        }
        info!("Deleted checklist item {}", id);
        Ok(())
    }

    /// Seeds the given condition labels; returns how many were new.
    pub fn ensure_default_items(&self, labels: &[String]) -> Result<usize> {
        let mut created = 0;
        for label in labels {
            let cond = ConditionRef::from_label(label)?;
            if upsert_item(&self.conn, &cond)?.was_created() {
                created += 1;
            }
        }
        if created > 0 {
            debug!("Seeded {} checklist items", created);
        }
        Ok(created)
    }

    pub fn trade_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM trade", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn insert_trade(conn: &Connection, t: &NewTrade) -> Result<i64> {
    conn.execute(
        "INSERT INTO trade (
            symbol, direction, entry_time, rr, session, h4_dir, h1_dir, m15_dir,
            mtf_score, result, notes, entry_price, stop_price, exit_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            t.symbol,
            t.direction,
            t.entry_time,
            t.rr,
            t.session(),
            t.h4,
            t.h1,
            t.m15,
            t.mtf_score(),
            t.result,
            t.notes,
            t.entry_price,
            t.stop_price,
            t.exit_price,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// Uniqueness on `key` makes concurrent creators converge on one row.
fn upsert_item(conn: &Connection, cond: &ConditionRef) -> Result<ItemInsert> {
    let inserted = conn.execute(
        "INSERT INTO checklist_item (key, label) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING",
        params![cond.key, cond.label],
    )?;
    let item = conn.query_row(
        "SELECT id, key, label FROM checklist_item WHERE key = ?1",
        params![cond.key],
        item_from_row,
    )?;
    Ok(if inserted == 1 {
        debug!("Created checklist item {:?}", item.key);
        ItemInsert::Created(item)
    } else {
        ItemInsert::Existing(item)
    })
}

fn link_condition(conn: &Connection, trade_id: i64, cond: &ConditionRef) -> Result<()> {
    let exists = conn
        .prepare("SELECT 1 FROM trade WHERE id = ?1")?
        .exists(params![trade_id])?;
    if !exists {
        return Err(JournalError::not_found("trade", trade_id));
    }
    let item = upsert_item(conn, cond)?;
    conn.execute(
        "INSERT OR IGNORE INTO trade_checklist (trade_id, item_id, checked) VALUES (?1, ?2, 1)",
        params![trade_id, item.item().id],
    )?;
    Ok(())
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        symbol: row.get(1)?,
        direction: row.get(2)?,
        entry_time: row.get(3)?,
        rr: row.get(4)?,
        session: row.get(5)?,
        h4: row.get(6)?,
        h1: row.get(7)?,
        m15: row.get(8)?,
        mtf_score: row.get(9)?,
        result: row.get(10)?,
        notes: row.get(11)?,
        entry_price: row.get(12)?,
        stop_price: row.get(13)?,
        exit_price: row.get(14)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ChecklistItem> {
    Ok(ChecklistItem {
        id: row.get(0)?,
        key: row.get(1)?,
        label: row.get(2)?,
    })
}
