//! Schema migrations tracked through SQLite's `user_version` pragma.
//!
//! Step `n` in [`STEPS`] moves the schema from version `n` to `n + 1`.
//! Steps are append-only; never edit one that has shipped.

use tokio_rusqlite::Connection;

use super::Error;

const STEPS: &[&str] = &[include_str!("../../migrations/001_buckets.sql")];

/// Schema version a fully migrated database reports.
pub const SCHEMA_VERSION: usize = STEPS.len();

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Each pending step runs in its own transaction together with the version
/// bump, so a failed step leaves the database at the last good version.
pub async fn run(conn: &Connection) -> Result<usize, Error> {
    conn.call(|conn| -> Result<usize, Error> {
        let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        let found = usize::try_from(found).map_err(|_| Error::MigrationFailed(format!("bad user_version {found}")))?;

        if found > SCHEMA_VERSION {
            return Err(Error::MigrationFailed(format!(
                "database schema v{found} is newer than this build (v{SCHEMA_VERSION})"
            )));
        }

        for (step, sql) in STEPS.iter().enumerate().skip(found) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("step {}: {e}", step + 1)))?;
            tx.pragma_update(None, "user_version", (step + 1) as i64)?;
            tx.commit()?;
            tracing::debug!(version = step + 1, "cache schema migrated");
        }

        Ok(SCHEMA_VERSION - found)
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user_version(conn: &Connection) -> i64 {
        conn.call(|conn| conn.pragma_query_value(None, "user_version", |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_applies_every_step() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), SCHEMA_VERSION);
        assert_eq!(user_version(&conn).await, SCHEMA_VERSION as i64);

        let tables: i64 = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('buckets', 'entries')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_newer_schema_is_refused() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| conn.pragma_update(None, "user_version", 99i64))
            .await
            .unwrap();
        assert!(matches!(run(&conn).await, Err(Error::MigrationFailed(_))));
    }
}
