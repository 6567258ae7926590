//! Cached response operations.
//!
//! `CacheDb` acts as the cache storage collaborator: responses are stored
//! per cache name under an arbitrary string key.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::entry_hash;
use super::storage::CacheStorage;
use crate::{Error, Response};

#[async_trait]
impl CacheStorage for CacheDb {
    async fn put(&self, cache_name: &str, key: &str, response: &Response) -> Result<(), Error> {
        let hash = entry_hash(cache_name, key);
        let cache_name = cache_name.to_string();
        let cache_key = key.to_string();
        let response = response.clone();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::StorageWriteFailure { key: cache_key.clone(), reason: e.to_string() })?;
        let stored_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (
                        hash, cache_name, cache_key, url, status, redirected, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(hash) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        redirected = excluded.redirected,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        hash,
                        cache_name,
                        cache_key,
                        &response.url,
                        response.status,
                        response.redirected as i32,
                        headers_json,
                        &response.body,
                        stored_at,
                    ],
                )
                .map_err(|e| Error::StorageWriteFailure { key: cache_key.clone(), reason: e.to_string() })?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn lookup(&self, cache_name: &str, key: &str) -> Result<Option<Response>, Error> {
        let hash = entry_hash(cache_name, key);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, redirected, headers_json, body FROM cache_entries WHERE hash = ?1",
                )?;

                let result = stmt.query_row(params![hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, i32>(2)? == 1,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                });

                match result {
                    Ok((url, status, redirected, headers_json, body)) => {
                        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::InvalidInput(format!("corrupt cached headers: {e}")))?;
                        Ok(Some(Response { url, status, headers, body, redirected }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        let hash = entry_hash(cache_name, key);
        let cache_key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn
                    .execute("DELETE FROM cache_entries WHERE hash = ?1", params![hash])
                    .map_err(|e| Error::StorageDeleteFailure { key: cache_key, reason: e.to_string() })?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT cache_key FROM cache_entries WHERE cache_name = ?1 ORDER BY cache_key")?;
                let keys = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT cache_name FROM cache_entries ORDER BY cache_name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_cache(&self, cache_name: &str) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn
                    .execute("DELETE FROM cache_entries WHERE cache_name = ?1", params![cache_name])
                    .map_err(|e| Error::StorageDeleteFailure { key: cache_name.clone(), reason: e.to_string() })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Delete the oldest entries of a cache until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru_entries(&self, cache_name: &str, max_entries: usize) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
                    params![cache_name],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE hash IN (
                    SELECT hash FROM cache_entries WHERE cache_name = ?1 ORDER BY stored_at ASC LIMIT ?2
                )",
                    params![cache_name, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
