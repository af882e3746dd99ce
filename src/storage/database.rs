use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::slots::Configuration;

const LAST_CONFIGURATION_KEY: &str = "last_configuration";
pub const SERVICE_URL_KEY: &str = "generation_service_url";

/// One finished build attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub generation: u64,
    pub slot_count: u32,
    /// `archive`, `deployed` or `failed`
    pub outcome: String,
    pub detail: String,
    pub created_at: i64,
}

impl SubmissionRecord {
    pub fn new(generation: u64, slot_count: usize, outcome: &str, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            generation,
            slot_count: slot_count as u32,
            outcome: outcome.to_string(),
            detail: detail.into(),
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(data_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join("slotsite.db");
        log::info!("Database: {}", db_path.display());

        Self::from_connection(Connection::open(&db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn();

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS app_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                generation INTEGER NOT NULL,
                slot_count INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                detail TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_submissions_created_at ON submissions(created_at DESC);
            ",
        )?;

        log::debug!("Database migrations complete");
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Empty values count as unset.
    pub fn get_setting(&self, key: &str) -> Option<String> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM app_config WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .ok()
        .flatten()
        .filter(|v| !v.is_empty())
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO app_config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn save_configuration(&self, config: &Configuration) -> Result<(), StorageError> {
        let json = serde_json::to_string(config)?;
        self.set_setting(LAST_CONFIGURATION_KEY, &json)
    }

    /// Configuration of the last successful build, if any.
    pub fn load_configuration(&self) -> Option<Configuration> {
        let json = self.get_setting(LAST_CONFIGURATION_KEY)?;
        match serde_json::from_str(&json) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring stored configuration: {}", e);
                None
            }
        }
    }

    // ── Submission log ──────────────────────────────────────────────────

    pub fn record_submission(&self, record: &SubmissionRecord) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO submissions (id, generation, slot_count, outcome, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.generation as i64,
                record.slot_count,
                record.outcome,
                record.detail,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn recent_submissions(&self, limit: u32) -> Result<Vec<SubmissionRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, generation, slot_count, outcome, detail, created_at
             FROM submissions
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![limit], |row| {
                Ok(SubmissionRecord {
                    id: row.get(0)?,
                    generation: row.get::<_, i64>(1)? as u64,
                    slot_count: row.get(2)?,
                    outcome: row.get(3)?,
                    detail: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::DeliveryMode;

    #[test]
    fn test_settings_roundtrip_and_empty_is_unset() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting(SERVICE_URL_KEY), None);

        db.set_setting(SERVICE_URL_KEY, "http://localhost:10000").unwrap();
        assert_eq!(
            db.get_setting(SERVICE_URL_KEY).as_deref(),
            Some("http://localhost:10000")
        );

        db.set_setting(SERVICE_URL_KEY, "").unwrap();
        assert_eq!(db.get_setting(SERVICE_URL_KEY), None);
    }

    #[test]
    fn test_last_configuration() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_configuration().is_none());

        let config = Configuration {
            title: "Riddle".into(),
            failure_message: "Again".into(),
            target_url: "https://example.com".into(),
            delivery_mode: DeliveryMode::Jump,
        };
        db.save_configuration(&config).unwrap();
        assert_eq!(db.load_configuration(), Some(config));

        db.set_setting(LAST_CONFIGURATION_KEY, "{broken").unwrap();
        assert!(db.load_configuration().is_none());
    }

    #[test]
    fn test_recent_submissions_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for generation in 1..=3 {
            let mut record = SubmissionRecord::new(generation, 10, "archive", "puzzle_site.zip");
            record.created_at = 1_000 * generation as i64;
            db.record_submission(&record).unwrap();
        }

        let recent = db.recent_submissions(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].generation, 3);
        assert_eq!(recent[1].generation, 2);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::new(dir.path().to_path_buf()).unwrap();
            db.set_setting("k", "v").unwrap();
        }
        let db = Database::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(db.get_setting("k").as_deref(), Some("v"));
    }
}
