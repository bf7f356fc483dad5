#![warn(missing_docs)]

//! Durable face metadata, keyed by geometry fingerprint.
//!
//! One SQLite table holds one row per fingerprint: the encoded
//! [`FaceMetadata`] record plus, for diagnostics, the JSON of the face
//! descriptor it was computed from. Every operation takes the connection
//! lock for its whole duration, so writers never interleave.
//!
//! ```no_run
//! use facetag_store::FingerprintStore;
//!
//! let store = FingerprintStore::open("facetag.db").unwrap();
//! println!("{} entries", store.stats().unwrap().total_entries);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use facetag_ir::codec::{decode_record, encode_record};
use facetag_ir::{CodecError, FaceDescriptor, FaceMetadata, Fingerprint};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS face_meta (
    fingerprint TEXT PRIMARY KEY,
    meta TEXT NOT NULL,
    raw TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
";

/// Errors from the fingerprint store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database could not be opened, read or written.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    /// A previous operation panicked while holding the connection.
    #[error("store connection lock poisoned")]
    Poisoned,

    /// A record could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The database directory could not be created.
    #[error("cannot create database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreEntry {
    /// Row key.
    pub fingerprint: Fingerprint,
    /// Decoded record.
    pub meta: FaceMetadata,
    /// Descriptor the fingerprint was computed from, when it was recorded.
    pub raw: Option<FaceDescriptor>,
    /// Unix time of the last write.
    pub updated_at: i64,
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of rows.
    pub total_entries: usize,
    /// Rows whose record carries a color.
    pub with_color: usize,
    /// Rows whose record carries a thread.
    pub with_thread: usize,
    /// Rows whose record carries a tolerance.
    pub with_tolerance: usize,
    /// Rows whose record cannot be decoded.
    pub corrupt_entries: usize,
}

/// Content-addressed store of face metadata.
#[derive(Debug)]
pub struct FingerprintStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl FingerprintStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "opened fingerprint store");
        Ok(store)
    }

    /// A private, non-persistent store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or replace the record for `fingerprint`. An empty record
    /// deletes the row instead. Returns whether a row was written.
    pub fn put(
        &self,
        fingerprint: &Fingerprint,
        meta: &FaceMetadata,
        raw: Option<&FaceDescriptor>,
    ) -> Result<bool, StoreError> {
        if meta.is_empty() {
            self.delete(fingerprint)?;
            return Ok(false);
        }

        let encoded = encode_record(meta)?;
        let raw = raw
            .map(serde_json::to_string)
            .transpose()
            .map_err(CodecError::from)?;

        self.conn()?.execute(
            "INSERT INTO face_meta (fingerprint, meta, raw, updated_at)
             VALUES (?1, ?2, ?3, strftime('%s', 'now'))
             ON CONFLICT(fingerprint) DO UPDATE SET
                meta = excluded.meta,
                raw = COALESCE(excluded.raw, face_meta.raw),
                updated_at = excluded.updated_at",
            params![fingerprint.as_str(), encoded, raw],
        )?;
        debug!(%fingerprint, "stored face metadata");
        Ok(true)
    }

    /// Record for `fingerprint`. A row that cannot be decoded reads as
    /// absent.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<FaceMetadata>, StoreError> {
        let payload: Option<String> = self
            .conn()?
            .query_row(
                "SELECT meta FROM face_meta WHERE fingerprint = ?1",
                params![fingerprint.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload.and_then(|p| decode_or_warn(fingerprint, &p)))
    }

    /// Records for every fingerprint that has one, under one lock.
    pub fn get_many<'a>(
        &self,
        fingerprints: impl IntoIterator<Item = &'a Fingerprint>,
    ) -> Result<HashMap<Fingerprint, FaceMetadata>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT meta FROM face_meta WHERE fingerprint = ?1")?;
        let mut found = HashMap::new();
        for fingerprint in fingerprints {
            let payload: Option<String> = stmt
                .query_row(params![fingerprint.as_str()], |row| row.get(0))
                .optional()?;
            if let Some(meta) = payload.and_then(|p| decode_or_warn(fingerprint, &p)) {
                found.insert(fingerprint.clone(), meta);
            }
        }
        Ok(found)
    }

    /// Full row for `fingerprint`, including the recorded descriptor.
    pub fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<StoreEntry>, StoreError> {
        let row: Option<(String, Option<String>, i64)> = self
            .conn()?
            .query_row(
                "SELECT meta, raw, updated_at FROM face_meta WHERE fingerprint = ?1",
                params![fingerprint.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        Ok(row.and_then(|(meta, raw, updated_at)| {
            let meta = decode_or_warn(fingerprint, &meta)?;
            let raw = raw.and_then(|r| serde_json::from_str(&r).ok());
            Some(StoreEntry {
                fingerprint: fingerprint.clone(),
                meta,
                raw,
                updated_at,
            })
        }))
    }

    /// Remove one row. Returns whether it existed.
    pub fn delete(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        let removed = self.conn()?.execute(
            "DELETE FROM face_meta WHERE fingerprint = ?1",
            params![fingerprint.as_str()],
        )?;
        Ok(removed > 0)
    }

    /// Remove the rows of the given fingerprints in one transaction. Missing
    /// fingerprints are ignored. Returns the number of rows removed.
    pub fn delete_many<'a>(
        &self,
        fingerprints: impl IntoIterator<Item = &'a Fingerprint>,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM face_meta WHERE fingerprint = ?1")?;
            for fingerprint in fingerprints {
                removed += stmt.execute(params![fingerprint.as_str()])?;
            }
        }
        tx.commit()?;
        debug!(removed, "deleted face metadata");
        Ok(removed)
    }

    /// Remove every row. Returns the number removed.
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        let removed = self.conn()?.execute("DELETE FROM face_meta", [])?;
        info!(removed, "cleared fingerprint store");
        Ok(removed)
    }

    /// Counts over all rows.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT meta FROM face_meta")?;
        let payloads = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut stats = StoreStats::default();
        for payload in payloads {
            stats.total_entries += 1;
            match decode_record(&payload?) {
                Ok(meta) => {
                    stats.with_color += usize::from(meta.color.is_some());
                    stats.with_thread += usize::from(meta.thread.is_some());
                    stats.with_tolerance += usize::from(meta.tolerance.is_some());
                }
                Err(_) => stats.corrupt_entries += 1,
            }
        }
        Ok(stats)
    }
}

fn decode_or_warn(fingerprint: &Fingerprint, payload: &str) -> Option<FaceMetadata> {
    match decode_record(payload) {
        Ok(meta) if !meta.is_empty() => Some(meta),
        Ok(_) => None,
        Err(err) => {
            warn!(%fingerprint, %err, "ignoring corrupt stored record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetag_ir::{Attribute, Color, SurfaceDescriptor, ThreadSpec, ToleranceSpec, Vec3};

    fn fp(byte: &str) -> Fingerprint {
        Fingerprint::from_hex(&byte.repeat(32)).unwrap()
    }

    fn red() -> FaceMetadata {
        let mut meta = FaceMetadata::default();
        meta.set(Attribute::Color(Color::new(0xFF, 0, 0)));
        meta
    }

    fn threaded() -> FaceMetadata {
        let mut meta = red();
        meta.set(Attribute::Thread(ThreadSpec {
            kind: "metric".into(),
            size: "M10".into(),
            pitch: "1.5".into(),
            class: "6H".into(),
        }));
        meta
    }

    #[test]
    fn test_put_get_overwrite() {
        let store = FingerprintStore::open_in_memory().unwrap();
        assert!(store.get(&fp("aa")).unwrap().is_none());

        assert!(store.put(&fp("aa"), &red(), None).unwrap());
        assert_eq!(store.get(&fp("aa")).unwrap(), Some(red()));

        assert!(store.put(&fp("aa"), &threaded(), None).unwrap());
        assert_eq!(store.get(&fp("aa")).unwrap(), Some(threaded()));
        assert_eq!(store.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn test_empty_record_deletes() {
        let store = FingerprintStore::open_in_memory().unwrap();
        store.put(&fp("aa"), &red(), None).unwrap();

        let mut meta = red();
        meta.remove(facetag_ir::AttributeKind::Color);
        assert!(!store.put(&fp("aa"), &meta, None).unwrap());
        assert!(store.get(&fp("aa")).unwrap().is_none());
        assert_eq!(store.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn test_raw_descriptor_kept() {
        let store = FingerprintStore::open_in_memory().unwrap();
        let raw = FaceDescriptor {
            entity_id: 7,
            label: None,
            surface: SurfaceDescriptor::Cylinder {
                origin: Vec3::new(0.0, 0.0, 0.0),
                axis: Vec3::new(0.0, 0.0, 1.0),
                radius: 5.0,
            },
            bounds: None,
        };
        store.put(&fp("bb"), &red(), Some(&raw)).unwrap();
        // A later write without a descriptor keeps the recorded one.
        store.put(&fp("bb"), &threaded(), None).unwrap();

        let entry = store.entry(&fp("bb")).unwrap().unwrap();
        assert_eq!(entry.meta, threaded());
        assert_eq!(entry.raw, Some(raw));
        assert!(entry.updated_at > 0);
    }

    #[test]
    fn test_delete_many_is_idempotent() {
        let store = FingerprintStore::open_in_memory().unwrap();
        store.put(&fp("aa"), &red(), None).unwrap();
        store.put(&fp("bb"), &red(), None).unwrap();
        store.put(&fp("cc"), &red(), None).unwrap();

        let targets = [fp("aa"), fp("bb"), fp("dd")];
        assert_eq!(store.delete_many(&targets).unwrap(), 2);
        assert_eq!(store.delete_many(&targets).unwrap(), 0);
        assert_eq!(store.get(&fp("cc")).unwrap(), Some(red()));
    }

    #[test]
    fn test_clear_all() {
        let store = FingerprintStore::open_in_memory().unwrap();
        store.put(&fp("aa"), &red(), None).unwrap();
        store.put(&fp("bb"), &red(), None).unwrap();
        assert_eq!(store.clear_all().unwrap(), 2);
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_get_many() {
        let store = FingerprintStore::open_in_memory().unwrap();
        store.put(&fp("aa"), &red(), None).unwrap();
        store.put(&fp("bb"), &threaded(), None).unwrap();

        let found = store.get_many(&[fp("aa"), fp("bb"), fp("cc")]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&fp("bb")], threaded());
    }

    #[test]
    fn test_corrupt_row_reads_as_absent() {
        let store = FingerprintStore::open_in_memory().unwrap();
        store.put(&fp("aa"), &red(), None).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO face_meta (fingerprint, meta) VALUES (?1, 'garbage!')",
                params![fp("ee").as_str()],
            )
            .unwrap();

        assert!(store.get(&fp("ee")).unwrap().is_none());
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.corrupt_entries, 1);
        assert_eq!(stats.with_color, 1);
    }

    #[test]
    fn test_stats_counts_kinds() {
        let store = FingerprintStore::open_in_memory().unwrap();
        let mut tol = FaceMetadata::default();
        tol.set(Attribute::Tolerance(ToleranceSpec {
            kind: "flatness".into(),
            value: "0.05".into(),
            datum: String::new(),
        }));
        store.put(&fp("aa"), &red(), None).unwrap();
        store.put(&fp("bb"), &threaded(), None).unwrap();
        store.put(&fp("cc"), &tol, None).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.with_color, 2);
        assert_eq!(stats.with_thread, 1);
        assert_eq!(stats.with_tolerance, 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("facetag.db");
        {
            let store = FingerprintStore::open(&path).unwrap();
            store.put(&fp("aa"), &red(), None).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }
        let store = FingerprintStore::open(&path).unwrap();
        assert_eq!(store.get(&fp("aa")).unwrap(), Some(red()));
    }
}
