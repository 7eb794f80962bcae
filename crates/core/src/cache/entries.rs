//! SQLite implementation of [`CacheStore`].
//!
//! Buckets are rows in `buckets`; entries cascade with their bucket.

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::hash::RequestKey;
use super::store::{CacheStore, StoredResponse};
use crate::Error;

// Inserts nothing when the bucket row is missing.
const UPSERT_ENTRY: &str = "INSERT INTO entries (
        bucket, key_hash, method, url, status, headers_json, body, stored_at
    )
    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
    WHERE EXISTS (SELECT 1 FROM buckets WHERE name = ?1)
    ON CONFLICT(bucket, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status = excluded.status,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

const OPEN_BUCKET: &str = "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)";

/// Returns whether a row was written.
fn upsert(
    conn: &rusqlite::Connection, bucket: &str, key: &RequestKey, response: &StoredResponse,
) -> Result<bool, Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    let written = conn.execute(
        UPSERT_ENTRY,
        params![
            bucket,
            key.hash(),
            key.method(),
            key.url(),
            response.status,
            headers_json,
            &response.body,
            &response.stored_at,
        ],
    )?;
    Ok(written > 0)
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(OPEN_BUCKET, params![bucket, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM buckets WHERE name = ?1", params![bucket])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn lookup(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let bucket = bucket.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, body, stored_at
                    FROM entries WHERE bucket = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![bucket, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredResponse { url, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        let key = key.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> { upsert(conn, &bucket, &key, &response) })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let entries = entries.to_vec();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(OPEN_BUCKET, params![bucket, now])?;
                for (key, response) in &entries {
                    upsert(&tx, &bucket, key, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE bucket = ?1 ORDER BY url ASC")?;
                let keys = stmt
                    .query_map(params![bucket], |row| {
                        let method: String = row.get(0)?;
                        let url: String = row.get(1)?;
                        Ok(RequestKey::new(&method, &url))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
