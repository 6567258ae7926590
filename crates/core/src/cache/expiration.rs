//! Expiration timestamps for runtime cache entries.
//!
//! Timestamps are tracked per URL and cache name, separately from the
//! responses themselves, so eviction can be decided without reading bodies.

use chrono::Utc;
use tokio_rusqlite::params;

use super::connection::CacheDb;
use crate::Error;

impl CacheDb {
    /// Record that `url` was written to `cache_name` now.
    pub async fn touch_expiration(&self, cache_name: &str, url: &str) -> Result<(), Error> {
        self.set_expiration_timestamp(cache_name, url, Utc::now().timestamp_millis()).await
    }

    /// Record an explicit write time for `url`.
    pub async fn set_expiration_timestamp(&self, cache_name: &str, url: &str, timestamp_ms: i64) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_expiration (cache_name, url, timestamp_ms) VALUES (?1, ?2, ?3)
                     ON CONFLICT(cache_name, url) DO UPDATE SET timestamp_ms = excluded.timestamp_ms",
                    params![cache_name, url, timestamp_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Write time recorded for `url`, if any.
    pub async fn expiration_timestamp(&self, cache_name: &str, url: &str) -> Result<Option<i64>, Error> {
        let cache_name = cache_name.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<i64>, Error> {
                let mut stmt =
                    conn.prepare("SELECT timestamp_ms FROM cache_expiration WHERE cache_name = ?1 AND url = ?2")?;
                let result = stmt.query_row(params![cache_name, url], |row| row.get::<_, i64>(0));

                match result {
                    Ok(timestamp) => Ok(Some(timestamp)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs that exceed `max_age_ms` or fall outside the newest `max_entries`.
    ///
    /// Matching rows are removed from the timestamp table in the same call;
    /// the caller is responsible for deleting the cached responses.
    pub async fn take_expired(
        &self, cache_name: &str, now_ms: i64, max_age_ms: Option<i64>, max_entries: Option<usize>,
    ) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let mut expired: Vec<String> = Vec::new();

                if let Some(max_age_ms) = max_age_ms {
                    let cutoff = now_ms - max_age_ms;
                    let mut stmt = tx.prepare(
                        "SELECT url FROM cache_expiration WHERE cache_name = ?1 AND timestamp_ms < ?2
                         ORDER BY timestamp_ms DESC",
                    )?;
                    let urls = stmt
                        .query_map(params![cache_name, cutoff], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    expired.extend(urls);
                }

                if let Some(max_entries) = max_entries {
                    let mut stmt = tx.prepare(
                        "SELECT url FROM cache_expiration WHERE cache_name = ?1
                         ORDER BY timestamp_ms DESC LIMIT -1 OFFSET ?2",
                    )?;
                    let urls = stmt
                        .query_map(params![cache_name, max_entries as i64], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    for url in urls {
                        if !expired.contains(&url) {
                            expired.push(url);
                        }
                    }
                }

                for url in &expired {
                    tx.execute(
                        "DELETE FROM cache_expiration WHERE cache_name = ?1 AND url = ?2",
                        params![cache_name, url],
                    )?;
                }
                tx.commit()?;

                Ok(expired)
            })
            .await
            .map_err(Error::from)
    }

    /// Forget every timestamp for a cache.
    pub async fn clear_expiration(&self, cache_name: &str) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_expiration WHERE cache_name = ?1", params![cache_name])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
