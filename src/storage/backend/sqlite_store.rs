use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, Error as SqliteError, ErrorCode, OpenFlags};
use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::StorageError;
use crate::storage::backend::StorageBackend;

/// SQLite-backed persistent backend.
///
/// A single flat `kv_storage` table keyed by the storage key. `SQLITE_FULL`
/// surfaces as [`StorageError::QuotaExceeded`] so the engine's quota recovery
/// works against a full disk the same way it does against a full browser
/// storage area.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteBackend {
    /// Opens (or creates) the database at the given file path.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(|c| {
                c.busy_timeout(std::time::Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", &"WAL")?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS kv_storage (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
                    );",
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(16)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(manager)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn map_write_err(key: &str, e: SqliteError) -> StorageError {
        match e {
            SqliteError::SqliteFailure(ffi, _) if ffi.code == ErrorCode::DiskFull => {
                StorageError::QuotaExceeded {
                    key: key.to_string(),
                }
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Option<String> {
        let conn = self.conn().ok()?;
        conn.query_row(
            "SELECT value FROM kv_storage WHERE key=?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv_storage(key,value) VALUES (?1,?2)
             ON CONFLICT(key) DO UPDATE
             SET value=excluded.value, updated_at=strftime('%s','now')",
            params![key, value],
        )
        .map_err(|e| Self::map_write_err(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_storage WHERE key=?1", params![key])
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_storage", [])
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    fn len(&self) -> usize {
        let conn = match self.conn() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row::<u32, _, _>("SELECT COUNT(*) FROM kv_storage", [], |row| row.get(0))
            .unwrap_or(0) as usize
    }

    fn keys(&self) -> Vec<String> {
        let conn = match self.conn() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT key FROM kv_storage ORDER BY key") {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let rows = match stmt.query_map([], |row| row.get::<_, String>(0)) {
            Ok(r) => r,
            Err(_) => return vec![],
        };

        rows.filter_map(Result::ok).collect()
    }
}
