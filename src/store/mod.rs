//! SQLite persistence layer for blocking state and daily counters.
//!
//! Uses `rusqlite` with bundled SQLite. A single `state` table holds JSON
//! values keyed by name; the engine writes through on every transition, so
//! the store is the source of truth across restarts.

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::state::BlockingState;
use crate::error::AppError;

const KEY_IS_BLOCKING: &str = "isBlocking";
const KEY_BLOCKED_DOMAINS: &str = "blockedDomains";
const KEY_WHITELIST: &str = "whitelist";
const KEY_ACTIVE_RULE_IDS: &str = "activeRuleIds";
const KEY_BLOCKS_TODAY: &str = "blocksToday";
const KEY_LAST_RESET: &str = "lastReset";

/// Everything the store holds about the engine, as read back at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub enabled: bool,
    pub domains: Vec<String>,
    pub whitelist: Vec<String>,
    pub active_rule_ids: Vec<u32>,
}

/// Manages the SQLite database holding the daemon's durable state.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Write the full blocking state in one transaction.
    pub fn save_blocking_state(&self, state: &BlockingState) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        set_json(&tx, KEY_IS_BLOCKING, &state.enabled)?;
        set_json(&tx, KEY_BLOCKED_DOMAINS, &state.domains)?;
        set_json(&tx, KEY_WHITELIST, &state.whitelist)?;
        set_json(&tx, KEY_ACTIVE_RULE_IDS, &state.active_rule_ids)?;
        tx.commit()?;
        Ok(())
    }

    /// Read the persisted engine state, defaulting any missing key.
    pub fn load_persisted(&self) -> Result<PersistedState, AppError> {
        let conn = self.conn.lock().unwrap();
        Ok(PersistedState {
            enabled: get_json(&conn, KEY_IS_BLOCKING)?.unwrap_or(false),
            domains: get_json(&conn, KEY_BLOCKED_DOMAINS)?.unwrap_or_default(),
            whitelist: get_json(&conn, KEY_WHITELIST)?.unwrap_or_default(),
            active_rule_ids: get_json(&conn, KEY_ACTIVE_RULE_IDS)?.unwrap_or_default(),
        })
    }

    /// Read the daily counter: count and the date it was last reset on.
    pub fn load_counter(&self) -> Result<(u64, Option<NaiveDate>), AppError> {
        let conn = self.conn.lock().unwrap();
        let count: u64 = get_json(&conn, KEY_BLOCKS_TODAY)?.unwrap_or(0);
        let last_reset = get_json::<String>(&conn, KEY_LAST_RESET)?
            .and_then(|raw| raw.parse::<NaiveDate>().ok());
        Ok((count, last_reset))
    }

    /// Write the daily counter in one transaction.
    pub fn save_counter(&self, count: u64, date: NaiveDate) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        set_json(&tx, KEY_BLOCKS_TODAY, &count)?;
        set_json(&tx, KEY_LAST_RESET, &date.to_string())?;
        tx.commit()?;
        Ok(())
    }
}

fn get_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>, AppError> {
    let mut stmt = conn.prepare_cached("SELECT value FROM state WHERE key = ?1")?;
    let raw: Option<String> = stmt
        .query_row(params![key], |row| row.get(0))
        .optional()?;
    match raw {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .map_err(|e| AppError::Store(format!("corrupt value for key {key:?}: {e}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn set_json<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| AppError::Store(format!("failed to encode key {key:?}: {e}")))?;
    conn.execute(
        "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
        params![key, raw],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> BlockingState {
        BlockingState {
            enabled: true,
            domains: vec!["youtube.com".into(), "reddit.com".into()],
            whitelist: vec!["docs.com".into()],
            active_rule_ids: vec![1, 2],
        }
    }

    #[test]
    fn test_load_defaults_when_empty() {
        let store = StateStore::open_in_memory().unwrap();
        let persisted = store.load_persisted().unwrap();
        assert_eq!(persisted, PersistedState::default());

        let (count, last_reset) = store.load_counter().unwrap();
        assert_eq!(count, 0);
        assert!(last_reset.is_none());
    }

    #[test]
    fn test_blocking_state_round_trip() {
        let store = StateStore::open_in_memory().unwrap();
        let state = sample_state();
        store.save_blocking_state(&state).unwrap();

        let persisted = store.load_persisted().unwrap();
        assert!(persisted.enabled);
        assert_eq!(persisted.domains, state.domains);
        assert_eq!(persisted.whitelist, state.whitelist);
        assert_eq!(persisted.active_rule_ids, state.active_rule_ids);
    }

    #[test]
    fn test_save_overwrites_previous_state() {
        let store = StateStore::open_in_memory().unwrap();
        store.save_blocking_state(&sample_state()).unwrap();

        let disabled = BlockingState {
            enabled: false,
            domains: vec!["x.com".into()],
            whitelist: vec![],
            active_rule_ids: vec![],
        };
        store.save_blocking_state(&disabled).unwrap();

        let persisted = store.load_persisted().unwrap();
        assert!(!persisted.enabled);
        assert_eq!(persisted.domains, vec!["x.com".to_string()]);
        assert!(persisted.active_rule_ids.is_empty());
    }

    #[test]
    fn test_counter_round_trip() {
        let store = StateStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        store.save_counter(42, date).unwrap();

        let (count, last_reset) = store.load_counter().unwrap();
        assert_eq!(count, 42);
        assert_eq!(last_reset, Some(date));
    }

    #[test]
    fn test_state_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = StateStore::open(&path).unwrap();
            store.save_blocking_state(&sample_state()).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        let persisted = store.load_persisted().unwrap();
        assert!(persisted.enabled);
        assert_eq!(persisted.domains.len(), 2);
    }

    #[test]
    fn test_corrupt_value_reports_store_error() {
        let store = StateStore::open_in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO state (key, value) VALUES ('isBlocking', 'not-json')",
                [],
            )
            .unwrap();
        }
        let err = store.load_persisted().unwrap_err();
        assert_eq!(err.kind(), "Store");
    }
}
