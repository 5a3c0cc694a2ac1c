//! Durable session storage.
//!
//! Records live in a single JSON document. Every mutation rewrites the whole
//! document (temp file, fsync, rename) before the in-memory copy is updated,
//! so the process never observes a state the disk does not hold.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Identity, SessionRecord};
use crate::error::Error;
use crate::Result;

/// On-disk layout of the session document.
#[derive(Debug, Default, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

/// Durable, identity-keyed collection of session records.
///
/// At most one record exists per identity. Mutations are persisted before
/// they return; a failed write leaves both disk and memory unchanged.
pub struct SessionStore {
    path: PathBuf,
    records: RwLock<Vec<SessionRecord>>,
}

impl SessionStore {
    /// Open the store backed by `path`.
    ///
    /// A missing file is an empty store; the file is created on the first
    /// mutation. If the document holds several records for one identity, the
    /// last one wins and the cleaned document is written back immediately.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let loaded = read_document(&path)?;

        let mut records = Vec::with_capacity(loaded.sessions.len());
        let mut collapsed = 0;
        for record in loaded.sessions {
            if replace_or_push(&mut records, record) {
                collapsed += 1;
            }
        }

        if collapsed > 0 {
            warn!(
                path = %path.display(),
                collapsed,
                "session document held duplicate identities; keeping the latest"
            );
            write_document(&path, &records)?;
        }

        debug!(path = %path.display(), count = records.len(), "session store loaded");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the record for `identity` (exact match).
    pub fn find(&self, identity: &Identity) -> Result<Option<SessionRecord>> {
        let records = self.records.read().map_err(|_| Error::LockPoisoned)?;
        Ok(records.iter().find(|r| &r.identity == identity).cloned())
    }

    /// Insert `record`, replacing any record with the same identity.
    pub fn upsert(&self, record: SessionRecord) -> Result<()> {
        let identity = record.identity.clone();
        let replaced = self.mutate(|records| replace_or_push(records, record))?;
        debug!(%identity, replaced, "session stored");
        Ok(())
    }

    /// Remove the record for `identity`.
    ///
    /// Returns whether a record was removed. Removing an absent identity is
    /// not an error and does not touch the disk.
    pub fn remove(&self, identity: &Identity) -> Result<bool> {
        let removed = self.remove_matching(|r| &r.identity == identity)? > 0;
        if removed {
            debug!(%identity, "session removed");
        }
        Ok(removed)
    }

    /// Remove every record whose token is no longer valid at `now`.
    ///
    /// Returns the number of records removed.
    pub fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.remove_matching(|r| !r.is_valid_at(now))
    }

    /// Remove all records matching a predicate.
    ///
    /// Returns the number of records removed. Nothing is written when no
    /// record matches.
    pub fn remove_matching<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&SessionRecord) -> bool,
    {
        let mut records = self.records.write().map_err(|_| Error::LockPoisoned)?;
        if !records.iter().any(&predicate) {
            return Ok(0);
        }

        let next: Vec<SessionRecord> = records.iter().filter(|r| !predicate(*r)).cloned().collect();
        let removed = records.len() - next.len();
        write_document(&self.path, &next)?;
        *records = next;
        Ok(removed)
    }

    /// Snapshot of all records in document order.
    pub fn records(&self) -> Result<Vec<SessionRecord>> {
        let records = self.records.read().map_err(|_| Error::LockPoisoned)?;
        Ok(records.clone())
    }

    /// List all stored identities.
    pub fn identities(&self) -> Result<Vec<Identity>> {
        let records = self.records.read().map_err(|_| Error::LockPoisoned)?;
        Ok(records.iter().map(|r| r.identity.clone()).collect())
    }

    /// Get the number of records in the store.
    ///
    /// Counts through a poisoned lock: the collection is only ever replaced
    /// wholesale after a successful write, so it is never half-updated.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to a copy of the records, persist the copy, then publish it.
    ///
    /// The write lock is held throughout, so readers in this process see
    /// either the old collection or the new one.
    fn mutate<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<SessionRecord>) -> T,
    {
        let mut records = self.records.write().map_err(|_| Error::LockPoisoned)?;
        let mut next = records.clone();
        let out = f(&mut next);
        write_document(&self.path, &next)?;
        *records = next;
        Ok(out)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

/// Drop any record sharing `record`'s identity, then append `record`.
///
/// Returns true when an existing record was replaced.
fn replace_or_push(records: &mut Vec<SessionRecord>, record: SessionRecord) -> bool {
    let before = records.len();
    records.retain(|r| r.identity != record.identity);
    let replaced = records.len() != before;
    records.push(record);
    replaced
}

fn storage_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Storage {
        path: path.to_path_buf(),
        source,
    }
}

fn read_document(path: &Path) -> Result<SessionDocument> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SessionDocument::default()),
        Err(e) => return Err(storage_error(path)(e)),
    };

    if content.trim().is_empty() {
        return Ok(SessionDocument::default());
    }

    serde_json::from_str(&content).map_err(|source| Error::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the document atomically: unique temp file, fsync, rename.
///
/// The temp name carries the PID and a counter so two writers never share
/// a temp file.
fn write_document(path: &Path, records: &[SessionRecord]) -> Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    #[derive(Serialize)]
    struct DocumentRef<'a> {
        sessions: &'a [SessionRecord],
    }

    let json = serde_json::to_vec_pretty(&DocumentRef { sessions: records }).map_err(|source| {
        Error::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(storage_error(path))?;

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = dir.join(tmp_name);

    let written = write_synced(&tmp_path, &json).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(storage_error(path)(e));
    }

    sync_dir(&dir).map_err(storage_error(path))
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// Directory handles cannot be synced on other platforms; rename is the
// durability point there.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
