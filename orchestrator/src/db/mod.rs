//! SQLite checkpoint store
//!
//! Thread records live in ~/.foundry/foundry.db unless configured otherwise.

pub mod schema;
pub mod threads;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::StoreError;

/// Database connection wrapper with thread-safe access
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the default location (~/.foundry/foundry.db)
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    /// Open or create the database at a specific path
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        // Concurrent readers while a runner writes
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;

        tracing::info!("Database opened at {:?}", path);
        Ok(db)
    }

    /// In-memory database, gone when the last clone is dropped
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get the default database path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".foundry").join("foundry.db"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::create_tables(&conn)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open_at(&path).unwrap();
        assert!(path.exists());
        drop(db);
    }

    #[test]
    fn test_default_path_under_home() {
        let path = Database::default_path().unwrap();
        assert!(path.ends_with(".foundry/foundry.db"));
    }
}
