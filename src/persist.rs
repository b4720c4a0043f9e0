//! Durable cache mirror backed by SQLite key-value storage.
//! Entries are namespaced (`tropical_cache_` by default) and stored as a JSON
//! envelope `{data, expiry, compressed}`, optionally wrapped as
//! `"COMPRESSED:" + base64(json)`. Storage failures never propagate: every
//! error degrades to a logged no-op or an absent entry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default key namespace prefix.
pub const DEFAULT_PREFIX: &str = "tropical_cache_";

/// Marker prepended to base64-wrapped envelopes. Consumers reading rows
/// directly must strip it before decoding.
const COMPRESSED_MARKER: &str = "COMPRESSED:";

#[derive(Serialize, Deserialize)]
struct Envelope {
    data: serde_json::Value,
    /// Absolute expiry as Unix milliseconds.
    expiry: i64,
    compressed: bool,
}

/// SQLite-backed durable mirror for cache entries.
pub struct PersistentCache {
    conn: Mutex<Connection>,
    prefix: String,
    compress: bool,
}

impl PersistentCache {
    /// Open (or create) the mirror database with the default namespace.
    pub fn open(db_path: &Path) -> Result<Self, String> {
        Self::open_with(db_path, DEFAULT_PREFIX, false)
    }

    /// Open with an explicit namespace prefix and compression toggle.
    pub fn open_with(db_path: &Path, prefix: &str, compress: bool) -> Result<Self, String> {
        let conn = Connection::open(db_path)
            .map_err(|e| format!("failed to open persistent cache: {e}"))?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| format!("PRAGMA failed: {e}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_cache (
                cache_key TEXT PRIMARY KEY,
                envelope TEXT NOT NULL,
                expiry INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_kv_expiry ON kv_cache(expiry);",
        )
        .map_err(|e| format!("create table failed: {e}"))?;

        info!(path = %db_path.display(), prefix, "persistent cache opened");

        Ok(Self {
            conn: Mutex::new(conn),
            prefix: prefix.to_string(),
            compress,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Mirror a value under the namespaced key. Best-effort: serialization or
    /// storage failure is logged and swallowed.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let data = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, key, "persistent cache serialize failed");
                return;
            }
        };
        let expiry = now_millis() + ttl.as_millis() as i64;
        let envelope = Envelope {
            data,
            expiry,
            compressed: self.compress,
        };
        let json = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, key, "persistent cache envelope encode failed");
                return;
            }
        };
        let stored = if self.compress {
            format!("{}{}", COMPRESSED_MARKER, BASE64.encode(json.as_bytes()))
        } else {
            json
        };

        let conn = self.conn.lock();
        if let Err(e) = conn.execute(
            "INSERT OR REPLACE INTO kv_cache (cache_key, envelope, expiry)
             VALUES (?1, ?2, ?3)",
            params![self.namespaced(key), stored, expiry],
        ) {
            warn!(error = %e, key, "persistent cache insert failed");
        }
    }

    /// Read a mirrored value back. Expired or undecodable rows are deleted
    /// and reported absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let namespaced = self.namespaced(key);
        let stored: Option<String> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT envelope FROM kv_cache WHERE cache_key = ?1",
                params![namespaced],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!(error = %e, key, "persistent cache read failed");
                None
            })
        };
        let stored = stored?;

        match self.decode::<T>(&stored) {
            Some(value) => {
                debug!(key, "persistent cache hit");
                Some(value)
            }
            None => {
                self.delete_row(&namespaced);
                None
            }
        }
    }

    /// Decode a stored envelope. None means expired or corrupt.
    fn decode<T: DeserializeOwned>(&self, stored: &str) -> Option<T> {
        let json = match stored.strip_prefix(COMPRESSED_MARKER) {
            Some(encoded) => {
                let bytes = BASE64.decode(encoded).ok()?;
                String::from_utf8(bytes).ok()?
            }
            None => stored.to_string(),
        };
        let envelope: Envelope = serde_json::from_str(&json).ok()?;
        if now_millis() > envelope.expiry {
            return None;
        }
        serde_json::from_value(envelope.data).ok()
    }

    fn delete_row(&self, namespaced_key: &str) {
        let conn = self.conn.lock();
        if let Err(e) = conn.execute(
            "DELETE FROM kv_cache WHERE cache_key = ?1",
            params![namespaced_key],
        ) {
            warn!(error = %e, "persistent cache delete failed");
        }
    }

    /// Remove one namespaced entry. Returns true if a row was deleted.
    pub fn remove(&self, key: &str) -> bool {
        let conn = self.conn.lock();
        match conn.execute(
            "DELETE FROM kv_cache WHERE cache_key = ?1",
            params![self.namespaced(key)],
        ) {
            Ok(count) => count > 0,
            Err(e) => {
                warn!(error = %e, key, "persistent cache remove failed");
                false
            }
        }
    }

    /// Remove every entry under this mirror's namespace. GLOB rather than
    /// LIKE: the default prefix contains `_`, which LIKE treats as a wildcard.
    pub fn clear(&self) {
        let conn = self.conn.lock();
        if let Err(e) = conn.execute(
            "DELETE FROM kv_cache WHERE cache_key GLOB ?1",
            params![format!("{}*", self.prefix)],
        ) {
            warn!(error = %e, "persistent cache clear failed");
        }
    }

    /// Remove expired entries. Called periodically from a background task.
    pub fn cleanup_expired(&self) -> usize {
        let conn = self.conn.lock();
        match conn.execute(
            "DELETE FROM kv_cache WHERE expiry <= ?1 AND cache_key GLOB ?2",
            params![now_millis(), format!("{}*", self.prefix)],
        ) {
            Ok(count) => {
                if count > 0 {
                    info!(removed = count, "persistent cache cleanup");
                }
                count
            }
            Err(e) => {
                warn!(error = %e, "persistent cache cleanup failed");
                0
            }
        }
    }

    /// Start a background cleanup loop (runs every hour).
    pub fn start_cleanup_loop(cache: Arc<Self>) {
        std::thread::Builder::new()
            .name("persist-cache-cleanup".into())
            .spawn(move || loop {
                std::thread::sleep(Duration::from_secs(3600));
                cache.cleanup_expired();
            })
            .expect("failed to spawn persistent cache cleanup thread");
    }
}

/// Current time as Unix timestamp (milliseconds).
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp(compress: bool) -> (tempfile::TempDir, PersistentCache) {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = PersistentCache::open_with(&dir.path().join("cache.db"), DEFAULT_PREFIX, compress)
            .expect("open");
        (dir, cache)
    }

    #[test]
    fn round_trip() {
        let (_dir, cache) = open_temp(false);
        cache.set("k", &vec!["a".to_string(), "b".to_string()], Duration::from_secs(60));
        let got: Option<Vec<String>> = cache.get("k");
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn expired_entry_is_absent_and_deleted() {
        let (_dir, cache) = open_temp(false);
        cache.set("k", &"v".to_string(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        let got: Option<String> = cache.get("k");
        assert_eq!(got, None);

        // The row itself was removed, not just masked.
        let conn = cache.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn compressed_envelope_round_trips_with_marker() {
        let (_dir, cache) = open_temp(true);
        cache.set("k", &"payload".to_string(), Duration::from_secs(60));

        let stored: String = {
            let conn = cache.conn.lock();
            conn.query_row(
                "SELECT envelope FROM kv_cache WHERE cache_key = ?1",
                params![format!("{DEFAULT_PREFIX}k")],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert!(stored.starts_with(COMPRESSED_MARKER));

        let got: Option<String> = cache.get("k");
        assert_eq!(got, Some("payload".to_string()));
    }

    #[test]
    fn corrupt_envelope_degrades_to_absent() {
        let (_dir, cache) = open_temp(false);
        {
            let conn = cache.conn.lock();
            conn.execute(
                "INSERT INTO kv_cache (cache_key, envelope, expiry) VALUES (?1, ?2, ?3)",
                params![format!("{DEFAULT_PREFIX}bad"), "{not json", i64::MAX],
            )
            .unwrap();
        }
        let got: Option<String> = cache.get("bad");
        assert_eq!(got, None);
    }

    #[test]
    fn clear_is_scoped_to_the_namespace() {
        let (_dir, cache) = open_temp(false);
        cache.set("mine", &1u32, Duration::from_secs(60));
        {
            let conn = cache.conn.lock();
            conn.execute(
                "INSERT INTO kv_cache (cache_key, envelope, expiry) VALUES (?1, ?2, ?3)",
                params!["other_ns_key", "{}", i64::MAX],
            )
            .unwrap();
        }
        cache.clear();

        let conn = cache.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn cleanup_removes_only_expired_rows() {
        let (_dir, cache) = open_temp(false);
        cache.set("old", &"x".to_string(), Duration::from_millis(0));
        cache.set("live", &"y".to_string(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.cleanup_expired(), 1);
        let got: Option<String> = cache.get("live");
        assert_eq!(got, Some("y".to_string()));
    }
}
