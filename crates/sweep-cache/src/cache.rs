use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sweep_core::errors::{ErrorInfo, SweepError};
use sweep_core::{from_json_slice, to_canonical_json_bytes, Record, SchemaVersion};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::fingerprint::Fingerprint;
use crate::flight::{FlightGuard, SingleFlight};

/// Schema written into every cache entry.
pub const CACHE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Supported persistent cache backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Single sqlite database file.
    Sqlite(PathBuf),
    /// Directory holding one canonical JSON file per fingerprint.
    Directory(PathBuf),
}

impl CacheBackend {
    /// Construct a backend from a filesystem path.
    ///
    /// `.sqlite` and `.db` files select sqlite, anything else a directory store.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("sqlite") | Some("db") => CacheBackend::Sqlite(path),
            _ => CacheBackend::Directory(path),
        }
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        match self {
            CacheBackend::Sqlite(path) | CacheBackend::Directory(path) => path,
        }
    }
}

/// Persisted cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Schema the entry was written with.
    pub schema: SchemaVersion,
    /// Key of the entry.
    pub fingerprint: Fingerprint,
    /// RFC 3339 timestamp of the first successful evaluation.
    pub created_at: String,
    /// Evaluator output.
    pub result: Record,
}

enum Store {
    Sqlite(Mutex<Connection>),
    Directory(PathBuf),
}

/// Fingerprint keyed result store shared by sweep invocations.
///
/// A disabled cache reports every lookup as absent and ignores stores.
pub struct ResultCache {
    store: Option<Store>,
    location: Option<PathBuf>,
    flights: SingleFlight,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("location", &self.location)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

fn cache_error(code: &str, message: &str, path: &Path, err: impl ToString) -> SweepError {
    SweepError::Cache(
        ErrorInfo::new(code, message)
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

impl ResultCache {
    /// Opens (creating when missing) the store described by `backend`.
    pub fn open(backend: &CacheBackend) -> Result<Self, SweepError> {
        let store = match backend {
            CacheBackend::Sqlite(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|err| {
                        cache_error("cache-create", "failed to create cache directory", parent, err)
                    })?;
                }
                let conn = Connection::open(path).map_err(|err| {
                    cache_error("cache-sqlite-open", "failed to open sqlite cache", path, err)
                })?;
                conn.execute_batch(
                    r#"CREATE TABLE IF NOT EXISTS results (
                        fingerprint TEXT PRIMARY KEY NOT NULL,
                        schema_major INTEGER NOT NULL,
                        created_at TEXT NOT NULL,
                        entry TEXT NOT NULL
                    );"#,
                )
                .map_err(|err| {
                    cache_error("cache-sqlite-schema", "failed to ensure cache schema", path, err)
                })?;
                Store::Sqlite(Mutex::new(conn))
            }
            CacheBackend::Directory(path) => {
                fs::create_dir_all(path).map_err(|err| {
                    cache_error("cache-create", "failed to create cache directory", path, err)
                })?;
                Store::Directory(path.clone())
            }
        };
        debug!(path = %backend.path().display(), "opened result cache");
        Ok(Self {
            store: Some(store),
            location: Some(backend.path().to_path_buf()),
            flights: SingleFlight::default(),
        })
    }

    /// Opens the store, degrading to a disabled cache when it cannot be reached.
    pub fn open_or_disabled(backend: &CacheBackend) -> Self {
        match Self::open(backend) {
            Ok(cache) => cache,
            Err(err) => {
                warn!(error = %err, "result cache unavailable, every point will be evaluated");
                Self::disabled()
            }
        }
    }

    /// Cache that never hits and never persists.
    pub fn disabled() -> Self {
        Self {
            store: None,
            location: None,
            flights: SingleFlight::default(),
        }
    }

    /// Returns true when lookups and stores reach a persistent store.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Location of the backing store, if enabled.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Returns the cached result for `fingerprint`.
    ///
    /// Read failures and entries from an incompatible schema count as absent.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Record> {
        match self.entry(fingerprint) {
            Ok(Some(entry)) if CACHE_SCHEMA.reads(&entry.schema) => Some(entry.result),
            Ok(Some(entry)) => {
                debug!(
                    fingerprint = %fingerprint.short(),
                    major = entry.schema.major,
                    "ignoring cache entry with incompatible schema"
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(fingerprint = %fingerprint.short(), error = %err, "cache read failed");
                None
            }
        }
    }

    /// Returns true when a usable entry exists for `fingerprint`.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lookup(fingerprint).is_some()
    }

    /// Reads the raw entry stored under `fingerprint`.
    pub fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, SweepError> {
        match &self.store {
            None => Ok(None),
            Some(Store::Sqlite(conn)) => {
                let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                read_sqlite(&conn, fingerprint)
            }
            Some(Store::Directory(root)) => read_file(&entry_path(root, fingerprint)),
        }
    }

    /// Persists `result` under `fingerprint`.
    ///
    /// Storing equal content twice is a no-op. Storing different content for an
    /// existing fingerprint fails with [`SweepError::Integrity`].
    pub fn store(&self, fingerprint: &Fingerprint, result: &Record) -> Result<(), SweepError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let entry = CacheEntry {
            schema: CACHE_SCHEMA,
            fingerprint: *fingerprint,
            created_at: chrono::Utc::now().to_rfc3339(),
            result: result.clone(),
        };
        let bytes = to_canonical_json_bytes(&entry)?;
        match store {
            Store::Sqlite(conn) => {
                let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                store_sqlite(&conn, &entry, bytes)
            }
            Store::Directory(root) => store_file(&entry_path(root, fingerprint), &entry, &bytes),
        }
    }

    /// Number of persisted entries.
    pub fn len(&self) -> Result<usize, SweepError> {
        match &self.store {
            None => Ok(0),
            Some(Store::Sqlite(conn)) => {
                let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))
                    .map_err(|err| sqlite_error("cache-sqlite-count", err))?;
                Ok(count as usize)
            }
            Some(Store::Directory(root)) => Ok(entry_files(root).count()),
        }
    }

    /// Returns true when no entry is persisted.
    pub fn is_empty(&self) -> Result<bool, SweepError> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry, returning how many were dropped.
    ///
    /// This is the only eviction the cache performs.
    pub fn clear(&self) -> Result<usize, SweepError> {
        match &self.store {
            None => Ok(0),
            Some(Store::Sqlite(conn)) => {
                let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                let removed = conn
                    .execute("DELETE FROM results", [])
                    .map_err(|err| sqlite_error("cache-sqlite-clear", err))?;
                Ok(removed)
            }
            Some(Store::Directory(root)) => {
                let mut removed = 0;
                for path in entry_files(root).collect::<Vec<_>>() {
                    fs::remove_file(&path).map_err(|err| {
                        cache_error("cache-remove", "failed to remove cache entry", &path, err)
                    })?;
                    removed += 1;
                }
                Ok(removed)
            }
        }
    }

    /// Blocks until no other caller holds `fingerprint`, then claims it.
    pub fn claim(&self, fingerprint: Fingerprint) -> FlightGuard<'_> {
        self.flights.claim(fingerprint)
    }
}

fn sqlite_error(code: &str, err: rusqlite::Error) -> SweepError {
    SweepError::Cache(ErrorInfo::new(code, "sqlite cache failure").with_hint(err.to_string()))
}

fn read_sqlite(conn: &Connection, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, SweepError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT entry FROM results WHERE fingerprint = ?1",
            [fingerprint.to_hex()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| sqlite_error("cache-sqlite-read", err))?;
    raw.map(|text| from_json_slice(text.as_bytes())).transpose()
}

fn store_sqlite(conn: &Connection, entry: &CacheEntry, bytes: Vec<u8>) -> Result<(), SweepError> {
    let text = String::from_utf8(bytes).map_err(|err| {
        SweepError::Serde(ErrorInfo::new("cache-encode", "cache entry is not utf-8").with_hint(err.to_string()))
    })?;
    let write = |verb: &str| {
        conn.execute(
            &format!(
                "INSERT OR {verb} INTO results (fingerprint, schema_major, created_at, entry)
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![
                entry.fingerprint.to_hex(),
                entry.schema.major as i64,
                &entry.created_at,
                &text,
            ],
        )
        .map_err(|err| sqlite_error("cache-sqlite-insert", err))
    };
    if write("IGNORE")? > 0 {
        return Ok(());
    }
    match occupant(read_sqlite(conn, &entry.fingerprint), &entry.fingerprint) {
        Occupant::Current(existing) => ensure_consistent(&existing, entry),
        Occupant::Vacant | Occupant::Stale => write("REPLACE").map(|_| ()),
    }
}

/// What a store finds already persisted under its fingerprint.
enum Occupant {
    Vacant,
    Current(CacheEntry),
    /// Unreadable, or written under an incompatible schema. Safe to replace.
    Stale,
}

fn occupant(read: Result<Option<CacheEntry>, SweepError>, fingerprint: &Fingerprint) -> Occupant {
    match read {
        Ok(None) => Occupant::Vacant,
        Ok(Some(existing)) if CACHE_SCHEMA.reads(&existing.schema) => Occupant::Current(existing),
        Ok(Some(_)) => Occupant::Stale,
        Err(err) => {
            warn!(fingerprint = %fingerprint.short(), error = %err, "replacing unreadable cache entry");
            Occupant::Stale
        }
    }
}

fn entry_path(root: &Path, fingerprint: &Fingerprint) -> PathBuf {
    let hex = fingerprint.to_hex();
    root.join(&hex[..2]).join(format!("{hex}.json"))
}

fn entry_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|item| item.file_type().is_file())
        .map(|item| item.into_path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
}

fn read_file(path: &Path) -> Result<Option<CacheEntry>, SweepError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)
        .map_err(|err| cache_error("cache-read", "failed to read cache entry", path, err))?;
    from_json_slice(&bytes).map(Some)
}

fn store_file(path: &Path, entry: &CacheEntry, bytes: &[u8]) -> Result<(), SweepError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            cache_error("cache-create", "failed to create cache shard", parent, err)
        })?;
    }
    let tmp = path.with_extension(format!(
        "tmp{}-{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&tmp, bytes)
        .map_err(|err| cache_error("cache-write", "failed to write cache entry", &tmp, err))?;
    // Linking never clobbers, so a concurrent writer's entry is compared, not overwritten.
    let outcome = match fs::hard_link(&tmp, path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            match occupant(read_file(path), &entry.fingerprint) {
                Occupant::Current(existing) => ensure_consistent(&existing, entry),
                Occupant::Vacant | Occupant::Stale => fs::rename(&tmp, path).map_err(|err| {
                    cache_error("cache-write", "failed to replace cache entry", path, err)
                }),
            }
        }
        Err(err) => Err(cache_error("cache-write", "failed to publish cache entry", path, err)),
    };
    // Already gone when the entry was replaced by rename.
    fs::remove_file(&tmp).ok();
    outcome
}

fn ensure_consistent(existing: &CacheEntry, entry: &CacheEntry) -> Result<(), SweepError> {
    if to_canonical_json_bytes(&existing.result)? == to_canonical_json_bytes(&entry.result)? {
        return Ok(());
    }
    Err(SweepError::Integrity(
        ErrorInfo::new(
            "cache-conflict",
            "fingerprint already maps to a different result",
        )
        .with_context("fingerprint", entry.fingerprint.to_hex())
        .with_context("stored_at", existing.created_at.clone())
        .with_hint("check for evaluators sharing a tag under tag-scoped fingerprints"),
    ))
}
