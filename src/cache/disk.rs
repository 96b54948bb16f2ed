/*!
 * Durable on-disk cache tier.
 *
 * SQLite-backed content-addressed store. Access goes through
 * `spawn_blocking` so lookups never block the async runtime, following the
 * same connection pattern as the rest of the codebase. Tier failures are
 * logged and degrade to misses; a broken disk never fails a job.
 */

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use super::{now_unix_secs, TranslationPayload};
use crate::errors::CacheError;

/// Default database filename
const DEFAULT_DB_FILENAME: &str = "cineglot-cache.db";

/// Default database directory name under the user's data directory
const DEFAULT_DB_DIRNAME: &str = "cineglot";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS translation_cache (
    fingerprint TEXT PRIMARY KEY,
    payload     TEXT NOT NULL,
    inserted_at INTEGER NOT NULL,
    ttl_secs    INTEGER NOT NULL
);
";

/// Disk tier wrapper with thread-safe connection access
#[derive(Clone)]
pub struct DiskCache {
    /// Path to the database file
    db_path: PathBuf,
    /// Thread-safe connection wrapped in Arc<Mutex>
    connection: Arc<Mutex<Connection>>,
}

impl DiskCache {
    /// Open (or create) the cache database at the default location
    pub fn new_default() -> Result<Self, CacheError> {
        let db_path = Self::default_database_path()?;
        Self::new(&db_path)
    }

    /// Open (or create) the cache database at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, CacheError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory: {:?}", parent))
                .map_err(|e| CacheError::Disk(e.to_string()))?;
        }

        info!("Opening disk cache at: {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| CacheError::Disk(format!("failed to open {:?}: {}", db_path, e)))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| CacheError::Disk(format!("failed to initialize schema: {}", e)))?;

        Ok(Self { db_path, connection: Arc::new(Mutex::new(conn)) })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, CacheError> {
        debug!("Creating in-memory disk cache");

        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::Disk(format!("failed to open in-memory db: {}", e)))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| CacheError::Disk(format!("failed to initialize schema: {}", e)))?;

        Ok(Self { db_path: PathBuf::from(":memory:"), connection: Arc::new(Mutex::new(conn)) })
    }

    /// Get the default database path
    pub fn default_database_path() -> Result<PathBuf, CacheError> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| CacheError::Disk("could not determine data directory".to_string()))?;

        Ok(base_dir.join(DEFAULT_DB_DIRNAME).join(DEFAULT_DB_FILENAME))
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Look up a fingerprint. Expired rows are deleted on the way out.
    pub async fn get(&self, fingerprint: &str) -> Option<TranslationPayload> {
        let connection = self.connection.clone();
        let fingerprint = fingerprint.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let conn = connection
                .lock()
                .map_err(|e| CacheError::Disk(format!("failed to acquire lock: {}", e)))?;

            let row: Option<(String, u64, u64)> = conn
                .query_row(
                    "SELECT payload, inserted_at, ttl_secs FROM translation_cache WHERE fingerprint = ?1",
                    params![fingerprint],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(|e| CacheError::Disk(format!("query failed: {}", e)))?;

            let Some((payload_json, inserted_at, ttl_secs)) = row else {
                return Ok::<Option<TranslationPayload>, CacheError>(None);
            };

            if now_unix_secs() > inserted_at.saturating_add(ttl_secs) {
                conn.execute(
                    "DELETE FROM translation_cache WHERE fingerprint = ?1",
                    params![fingerprint],
                )
                .map_err(|e| CacheError::Disk(format!("expiry delete failed: {}", e)))?;
                return Ok(None);
            }

            let payload: TranslationPayload = serde_json::from_str(&payload_json)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
            Ok(Some(payload))
        })
        .await;

        match result {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                warn!("Disk cache get failed, treating as miss: {}", e);
                None
            }
            Err(e) => {
                warn!("Disk cache task panicked, treating as miss: {}", e);
                None
            }
        }
    }

    /// Insert a payload. Idempotent: an existing identical row is left
    /// alone, a differing row is logged as corruption and kept.
    pub async fn put(&self, fingerprint: &str, payload: &TranslationPayload, ttl: Duration) {
        let connection = self.connection.clone();
        let fingerprint = fingerprint.to_string();
        let payload = payload.clone();

        let result = tokio::task::spawn_blocking(move || {
            let conn = connection
                .lock()
                .map_err(|e| CacheError::Disk(format!("failed to acquire lock: {}", e)))?;

            let payload_json = serde_json::to_string(&payload)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;

            let existing: Option<String> = conn
                .query_row(
                    "SELECT payload FROM translation_cache WHERE fingerprint = ?1",
                    params![fingerprint],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| CacheError::Disk(format!("query failed: {}", e)))?;

            if let Some(existing_json) = existing {
                if existing_json != payload_json {
                    warn!(
                        "Cache corruption: fingerprint {} on disk differs from new payload, keeping original",
                        fingerprint
                    );
                }
                return Ok::<(), CacheError>(());
            }

            conn.execute(
                "INSERT OR IGNORE INTO translation_cache (fingerprint, payload, inserted_at, ttl_secs)
                 VALUES (?1, ?2, ?3, ?4)",
                params![fingerprint, payload_json, now_unix_secs(), ttl.as_secs()],
            )
            .map_err(|e| CacheError::Disk(format!("insert failed: {}", e)))?;

            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Disk cache put failed, entry not persisted: {}", e),
            Err(e) => warn!("Disk cache task panicked, entry not persisted: {}", e),
        }
    }

    /// Number of live rows, used by tests and stats reporting
    pub async fn len(&self) -> usize {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = connection.lock().ok()?;
            conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| {
                row.get::<_, i64>(0)
            })
            .ok()
            .map(|n| n as usize)
        })
        .await
        .ok()
        .flatten()
        .unwrap_or(0)
    }
}
