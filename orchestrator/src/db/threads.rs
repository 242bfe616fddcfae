//! Thread record persistence

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::OptionalExtension;

use super::Database;
use crate::error::StoreError;
use crate::state::ThreadRecord;
use crate::store::CheckpointStore;

impl Database {
    /// Insert or replace a thread record
    pub fn save_thread(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO threads (thread_id, status, user_intent, created_at, last_update, record)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(thread_id) DO UPDATE SET
                status = excluded.status,
                last_update = excluded.last_update,
                record = excluded.record
            "#,
            (
                &record.thread_id,
                record.status.as_str(),
                &record.state.user_intent,
                record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                record.last_update.to_rfc3339_opts(SecondsFormat::Nanos, true),
                &json,
            ),
        )?;
        Ok(())
    }

    /// Get a thread record by id
    pub fn load_thread(&self, thread_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM threads WHERE thread_id = ?1",
                [thread_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// List all thread records, most recently created first
    pub fn list_thread_records(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT record FROM threads ORDER BY created_at DESC, rowid DESC")?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }
}

async fn blocking<T, F>(db: &Database, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(Database) -> Result<T, StoreError> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(db))
        .await
        .map_err(|e| StoreError::Unavailable(format!("database task failed: {}", e)))?
}

#[async_trait]
impl CheckpointStore for Database {
    async fn save(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        let record = record.clone();
        blocking(self, move |db| db.save_thread(&record)).await
    }

    async fn load(&self, thread_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
        let thread_id = thread_id.to_string();
        blocking(self, move |db| db.load_thread(&thread_id)).await
    }

    async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        blocking(self, |db| db.list_thread_records()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ThreadStatus;

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let mut record = ThreadRecord::new("t-1", "worry time");
        record.state.draft = "## Draft".to_string();

        db.save_thread(&record).unwrap();

        assert_eq!(db.load_thread("t-1").unwrap(), Some(record));
        assert_eq!(db.load_thread("missing").unwrap(), None);
    }

    #[test]
    fn test_save_replaces() {
        let db = Database::open_in_memory().unwrap();
        let mut record = ThreadRecord::new("t-1", "worry time");
        db.save_thread(&record).unwrap();

        record.status = ThreadStatus::Halted;
        record.state.iteration_count = 2;
        db.save_thread(&record).unwrap();

        let loaded = db.load_thread("t-1").unwrap().unwrap();
        assert_eq!(loaded.status, ThreadStatus::Halted);
        assert_eq!(loaded.state.iteration_count, 2);
        assert_eq!(db.list_thread_records().unwrap().len(), 1);
    }

    #[test]
    fn test_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let first = ThreadRecord::new("first", "a");
        let mut second = ThreadRecord::new("second", "b");
        second.created_at = first.created_at + chrono::Duration::milliseconds(5);

        db.save_thread(&first).unwrap();
        db.save_thread(&second).unwrap();

        let ids: Vec<_> = db
            .list_thread_records()
            .unwrap()
            .into_iter()
            .map(|r| r.thread_id)
            .collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_checkpoint_store_impl() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn CheckpointStore = &db;
        let record = ThreadRecord::new("t-1", "intent");

        store.save(&record).await.unwrap();

        assert_eq!(store.load("t-1").await.unwrap(), Some(record));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foundry.db");
        let record = ThreadRecord::new("t-1", "intent");

        Database::open_at(&path).unwrap().save_thread(&record).unwrap();

        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(reopened.load_thread("t-1").unwrap(), Some(record));
    }
}
