//! Persistence port for license records, plus the SQLite implementation.
//!
//! The evaluator and the admin handlers only see the [`LicenseStore`] trait;
//! the concrete store is injected at startup. [`SqliteStore`] keeps a single
//! connection behind a mutex, which is plenty for a service whose write
//! traffic is one row per license lifetime.

use crate::model::License;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Insert hit the unique constraint on `license_key`.
    #[error("license key already exists: {0}")]
    DuplicateKey(String),

    /// A targeted update found no matching row.
    #[error("license not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// Persistence contract consumed by the evaluator and admin operations.
pub trait LicenseStore: Send + Sync {
    /// Fetches a license by key, or `None` if absent.
    fn find_by_key(&self, key: &str) -> StoreResult<Option<License>>;

    /// Atomically binds `device` to the license iff it is still unbound.
    ///
    /// Returns true when this call performed the bind. A false return means
    /// the license was already bound (possibly by a concurrent request) or
    /// the key does not exist; callers re-fetch to tell which.
    fn try_bind_device(&self, key: &str, device: &str) -> StoreResult<bool>;

    /// Inserts a new license. Fails with [`StoreError::DuplicateKey`] when
    /// the key is already present.
    fn insert(&self, license: &License) -> StoreResult<()>;

    /// Sets the active flag. Fails with [`StoreError::NotFound`] when the
    /// key is absent; otherwise idempotent.
    fn set_active(&self, key: &str, active: bool) -> StoreResult<()>;

    /// Lists licenses ordered by creation time descending.
    fn list_recent(&self, limit: u32, offset: u32) -> StoreResult<Vec<License>>;
}

/// SQLite-backed license store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS licenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                license_key TEXT NOT NULL UNIQUE,
                device_id TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                expires_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_licenses_device
                ON licenses (device_id);
            ",
        )?;
        Ok(())
    }
}

impl LicenseStore for SqliteStore {
    fn find_by_key(&self, key: &str) -> StoreResult<Option<License>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT license_key, device_id, is_active, expires_at, created_at
             FROM licenses WHERE license_key = ?1",
        )?;
        let mut rows = stmt.query_map(params![key], |row| {
            let license_key: String = row.get(0)?;
            let device_id: Option<String> = row.get(1)?;
            let is_active: bool = row.get(2)?;
            let expires_at: Option<String> = row.get(3)?;
            let created_at: String = row.get(4)?;
            Ok((license_key, device_id, is_active, expires_at, created_at))
        })?;

        match rows.next() {
            None => Ok(None),
            Some(row) => {
                let (license_key, device_id, is_active, expires_at, created_at) = row?;
                Ok(Some(decode_license(
                    license_key,
                    device_id,
                    is_active,
                    expires_at,
                    created_at,
                )?))
            }
        }
    }

    fn try_bind_device(&self, key: &str, device: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        // Single conditional UPDATE: the WHERE clause is the compare-and-swap
        // that keeps two racing devices from both winning the bind.
        let affected = conn.execute(
            "UPDATE licenses SET device_id = ?1
             WHERE license_key = ?2 AND (device_id IS NULL OR device_id = '')",
            params![device, key],
        )?;
        Ok(affected > 0)
    }

    fn insert(&self, license: &License) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO licenses (license_key, device_id, is_active, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                license.license_key,
                license.device_id,
                license.is_active,
                license.expires_at.map(|t| t.to_rfc3339()),
                license.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateKey(license.license_key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_active(&self, key: &str, active: bool) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE licenses SET is_active = ?1 WHERE license_key = ?2",
            params![active, key],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    fn list_recent(&self, limit: u32, offset: u32) -> StoreResult<Vec<License>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT license_key, device_id, is_active, expires_at, created_at
             FROM licenses ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![i64::from(limit), i64::from(offset)], |row| {
            let license_key: String = row.get(0)?;
            let device_id: Option<String> = row.get(1)?;
            let is_active: bool = row.get(2)?;
            let expires_at: Option<String> = row.get(3)?;
            let created_at: String = row.get(4)?;
            Ok((license_key, device_id, is_active, expires_at, created_at))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (license_key, device_id, is_active, expires_at, created_at) = row?;
            result.push(decode_license(
                license_key,
                device_id,
                is_active,
                expires_at,
                created_at,
            )?);
        }
        Ok(result)
    }
}

fn decode_license(
    license_key: String,
    device_id: Option<String>,
    is_active: bool,
    expires_at: Option<String>,
    created_at: String,
) -> StoreResult<License> {
    let expires_at = match expires_at {
        None => None,
        Some(s) => Some(parse_stored_timestamp(&s)?),
    };
    let created_at = parse_stored_timestamp(&created_at)?;
    // An empty device_id column means unbound, same as NULL.
    let device_id = device_id.filter(|d| !d.is_empty());
    Ok(License {
        license_key,
        device_id,
        is_active,
        expires_at,
        created_at,
    })
}

fn parse_stored_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {s:?}: {e}")))
}
