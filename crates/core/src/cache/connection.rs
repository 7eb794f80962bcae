//! SQLite-backed cache storage handle.

use std::path::Path;
use std::time::Duration;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// WAL lets readers proceed while a background cache write is committing.
const SETUP: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the bucket database.
///
/// Cloning is cheap; all clones share one connection thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the database file and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        let db = Self::prepare(conn).await?;
        tracing::debug!(path = %path.display(), "cache database ready");
        Ok(db)
    }

    /// Private in-memory database; contents vanish with the handle.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(SETUP)
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;
        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fk: i64 = db
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_open_file_twice_keeps_schema() {
        let path = std::env::temp_dir().join(format!("swcache-open-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);

        drop(CacheDb::open(&path).await.unwrap());
        let db = CacheDb::open(&path).await.unwrap();
        let version: i64 = db
            .conn
            .call(|conn| conn.pragma_query_value(None, "user_version", |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(version, migrations::SCHEMA_VERSION as i64);

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
