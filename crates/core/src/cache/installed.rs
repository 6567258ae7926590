//! Persisted record of installed precache entries.

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::storage::InstallStore;
use crate::Error;
use crate::precache::InstalledEntry;

#[async_trait]
impl InstallStore for CacheDb {
    async fn load_installed(&self, cache_name: &str) -> Result<Vec<InstalledEntry>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<InstalledEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, revision, cache_key FROM installed_entries WHERE cache_name = ?1 ORDER BY url",
                )?;
                let entries = stmt
                    .query_map(params![cache_name], |row| {
                        Ok(InstalledEntry { url: row.get(0)?, revision: row.get(1)?, cache_key: row.get(2)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    async fn save_installed(&self, cache_name: &str, entries: &[InstalledEntry]) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let entries = entries.to_vec();
        let installed_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM installed_entries WHERE cache_name = ?1", params![cache_name])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO installed_entries (cache_name, url, revision, cache_key, installed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for entry in &entries {
                        stmt.execute(params![cache_name, entry.url, entry.revision, entry.cache_key, installed_at])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
