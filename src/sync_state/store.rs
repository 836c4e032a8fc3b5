use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{SyncError, SyncResult};

use super::{CategoryMapping, LogEntry, SourceSystem, SyncRecord, SyncStateStats};

/// A local SQLite-backed store pairing Device and Host tasks/categories across runs.
///
/// Mirrors the schema of the reference sync-state database: `sync_records` and
/// `category_mappings` tables plus an append-only `sync_log`, each indexed on the two
/// foreign ids so reverse lookups stay O(log n).
pub struct SyncStateStore {
    conn: Mutex<Connection>,
}

impl SyncStateStore {
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> SyncResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sync_records (
                sync_id           TEXT PRIMARY KEY,
                host_id           TEXT,
                device_id         TEXT,
                last_synced_hash  TEXT NOT NULL,
                last_sync_time    INTEGER NOT NULL,
                source_system     TEXT NOT NULL DEFAULT 'both'
            );
            CREATE INDEX IF NOT EXISTS idx_host_id ON sync_records(host_id);
            CREATE INDEX IF NOT EXISTS idx_device_id ON sync_records(device_id);

            CREATE TABLE IF NOT EXISTS category_mappings (
                device_id TEXT NOT NULL,
                host_id   TEXT NOT NULL,
                name      TEXT NOT NULL,
                PRIMARY KEY (device_id, host_id)
            );

            CREATE TABLE IF NOT EXISTS sync_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                action    TEXT NOT NULL,
                sync_id   TEXT,
                details   TEXT
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get_by_sync_id(&self, sync_id: &str) -> SyncResult<Option<SyncRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT sync_id, host_id, device_id, last_synced_hash, last_sync_time, source_system \
             FROM sync_records WHERE sync_id = ?1",
            params![sync_id],
            row_to_record,
        )
        .optional()
        .map_err(SyncError::from)
    }

    pub fn get_by_host_id(&self, host_id: &str) -> SyncResult<Option<SyncRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT sync_id, host_id, device_id, last_synced_hash, last_sync_time, source_system \
             FROM sync_records WHERE host_id = ?1",
            params![host_id],
            row_to_record,
        )
        .optional()
        .map_err(SyncError::from)
    }

    pub fn get_by_device_id(&self, device_id: &str) -> SyncResult<Option<SyncRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT sync_id, host_id, device_id, last_synced_hash, last_sync_time, source_system \
             FROM sync_records WHERE device_id = ?1",
            params![device_id],
            row_to_record,
        )
        .optional()
        .map_err(SyncError::from)
    }

    pub fn all_records(&self) -> SyncResult<Vec<SyncRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sync_id, host_id, device_id, last_synced_hash, last_sync_time, source_system \
             FROM sync_records",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(SyncError::from)
    }

    pub fn upsert(&self, record: &SyncRecord) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_records (sync_id, host_id, device_id, last_synced_hash, last_sync_time, source_system) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(sync_id) DO UPDATE SET \
                host_id = excluded.host_id, \
                device_id = excluded.device_id, \
                last_synced_hash = excluded.last_synced_hash, \
                last_sync_time = excluded.last_sync_time, \
                source_system = excluded.source_system",
            params![
                record.sync_id,
                record.host_id,
                record.device_id,
                record.last_synced_hash,
                record.last_sync_time,
                record.source_system.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, sync_id: &str) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sync_records WHERE sync_id = ?1", params![sync_id])?;
        Ok(())
    }

    pub fn get_category_mapping_by_device_id(
        &self,
        device_id: &str,
    ) -> SyncResult<Option<CategoryMapping>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT device_id, host_id, name FROM category_mappings WHERE device_id = ?1",
            params![device_id],
            row_to_mapping,
        )
        .optional()
        .map_err(SyncError::from)
    }

    pub fn get_category_mapping_by_host_id(
        &self,
        host_id: &str,
    ) -> SyncResult<Option<CategoryMapping>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT device_id, host_id, name FROM category_mappings WHERE host_id = ?1",
            params![host_id],
            row_to_mapping,
        )
        .optional()
        .map_err(SyncError::from)
    }

    pub fn all_category_mappings(&self) -> SyncResult<Vec<CategoryMapping>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT device_id, host_id, name FROM category_mappings")?;
        let rows = stmt.query_map([], row_to_mapping)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(SyncError::from)
    }

    pub fn upsert_category_mapping(&self, mapping: &CategoryMapping) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO category_mappings (device_id, host_id, name) VALUES (?1, ?2, ?3) \
             ON CONFLICT(device_id, host_id) DO UPDATE SET name = excluded.name",
            params![mapping.device_id, mapping.host_id, mapping.name],
        )?;
        Ok(())
    }

    pub fn log_action(
        &self,
        action: &str,
        sync_id: Option<&str>,
        details: Option<&str>,
    ) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_log (timestamp, action, sync_id, details) VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now().timestamp(), action, sync_id, details],
        )?;
        Ok(())
    }

    pub fn recent_logs(&self, limit: usize) -> SyncResult<Vec<LogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT timestamp, action, sync_id, details FROM sync_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(LogEntry {
                timestamp: row.get(0)?,
                action: row.get(1)?,
                sync_id: row.get(2)?,
                details: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(SyncError::from)
    }

    pub fn stats(&self) -> SyncResult<SyncStateStats> {
        let records = self.all_records()?;
        let mut stats = SyncStateStats::default();
        for r in records {
            match (r.host_id.is_some(), r.device_id.is_some()) {
                (true, true) => stats.both += 1,
                (true, false) => stats.host_only += 1,
                (false, true) => stats.device_only += 1,
                (false, false) => {}
            }
        }
        Ok(stats)
    }

    /// Wipes all pairing state and the audit log. Used by the `clear-state` CLI command.
    pub fn clear_all(&self) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM sync_records; DELETE FROM category_mappings; DELETE FROM sync_log;",
        )?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SyncRecord> {
    let source: String = row.get(5)?;
    Ok(SyncRecord {
        sync_id: row.get(0)?,
        host_id: row.get(1)?,
        device_id: row.get(2)?,
        last_synced_hash: row.get(3)?,
        last_sync_time: row.get(4)?,
        source_system: SourceSystem::from_str(&source),
    })
}

fn row_to_mapping(row: &rusqlite::Row) -> rusqlite::Result<CategoryMapping> {
    Ok(CategoryMapping {
        device_id: row.get(0)?,
        host_id: row.get(1)?,
        name: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_lookup_by_either_id() {
        let store = SyncStateStore::open_in_memory().unwrap();
        let mut record = SyncRecord::new("sync-1");
        record.host_id = Some("h1".into());
        record.device_id = Some("d1".into());
        record.last_synced_hash = "abc123".into();
        record.last_sync_time = 1000;
        store.upsert(&record).unwrap();

        assert_eq!(store.get_by_host_id("h1").unwrap().unwrap().sync_id, "sync-1");
        assert_eq!(store.get_by_device_id("d1").unwrap().unwrap().sync_id, "sync-1");
    }

    #[test]
    fn upsert_is_idempotent_on_sync_id() {
        let store = SyncStateStore::open_in_memory().unwrap();
        let mut record = SyncRecord::new("sync-1");
        record.last_synced_hash = "first".into();
        store.upsert(&record).unwrap();
        record.last_synced_hash = "second".into();
        store.upsert(&record).unwrap();

        assert_eq!(store.all_records().unwrap().len(), 1);
        assert_eq!(
            store.get_by_sync_id("sync-1").unwrap().unwrap().last_synced_hash,
            "second"
        );
    }

    #[test]
    fn delete_removes_record() {
        let store = SyncStateStore::open_in_memory().unwrap();
        store.upsert(&SyncRecord::new("sync-1")).unwrap();
        store.delete("sync-1").unwrap();
        assert!(store.get_by_sync_id("sync-1").unwrap().is_none());
    }

    #[test]
    fn stats_partitions_by_side_present() {
        let store = SyncStateStore::open_in_memory().unwrap();
        let mut both = SyncRecord::new("a");
        both.host_id = Some("h".into());
        both.device_id = Some("d".into());
        store.upsert(&both).unwrap();

        let mut host_only = SyncRecord::new("b");
        host_only.host_id = Some("h2".into());
        store.upsert(&host_only).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.both, 1);
        assert_eq!(stats.host_only, 1);
        assert_eq!(stats.device_only, 0);
    }

    #[test]
    fn category_mapping_round_trips() {
        let store = SyncStateStore::open_in_memory().unwrap();
        let mapping = CategoryMapping {
            device_id: "cat-d".into(),
            host_id: "cat-h".into(),
            name: "Groceries".into(),
        };
        store.upsert_category_mapping(&mapping).unwrap();
        let found = store
            .get_category_mapping_by_device_id("cat-d")
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Groceries");
    }

    #[test]
    fn log_action_is_retrievable_most_recent_first() {
        let store = SyncStateStore::open_in_memory().unwrap();
        store.log_action("sync_start", None, None).unwrap();
        store.log_action("sync_complete", None, Some("3 actions")).unwrap();

        let logs = store.recent_logs(10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, "sync_complete");
    }
}
