//! SQLite Blocklist Store
//!
//! Implements BlocklistStore on top of a SQLite database file.

use crate::domain::errors::StoreError;
use crate::domain::ports::BlocklistStore;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// SQLite-backed blocklist store.
///
/// The snapshot lives in a single `blocked_ips` table that is rewritten
/// inside one transaction on every save. Blocking SQLite calls run on
/// the blocking thread pool.
pub struct SqliteBlocklistStore {
    db_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SqliteBlocklistStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn write_snapshot(db_path: &Path, ips: &[String]) -> Result<(), StoreError> {
        let mut conn = Connection::open(db_path)?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocked_ips (ip TEXT PRIMARY KEY NOT NULL);
             DELETE FROM blocked_ips;",
        )?;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO blocked_ips (ip) VALUES (?1)")?;
            for ip in ips {
                stmt.execute(params![ip])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn read_snapshot(db_path: &Path) -> Result<Vec<String>, StoreError> {
        if !db_path.exists() {
            return Err(StoreError::NotFound);
        }

        let conn = Connection::open(db_path)?;
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'blocked_ips'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::NotFound);
        }

        let mut stmt = conn.prepare("SELECT ip FROM blocked_ips")?;
        let ips = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ips)
    }
}

#[async_trait]
impl BlocklistStore for SqliteBlocklistStore {
    async fn save_snapshot(&self, ips: &[String]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let db_path = self.db_path.clone();
        let ips = ips.to_vec();
        let count = ips.len();
        tokio::task::spawn_blocking(move || Self::write_snapshot(&db_path, &ips)).await??;

        tracing::debug!("saved {} blocked ips to {}", count, self.db_path.display());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Vec<String>, StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || Self::read_snapshot(&db_path)).await?
    }
}
