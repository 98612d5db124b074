//! Durable slot storage
//!
//! One [`CacheStore`] is constructed per process (or per cache root) and
//! shared by every interceptor. Each computation identity maps to exactly one
//! slot file under the root; a slot holds at most one [`CacheEntry`] and every
//! write replaces it.
//!
//! Writes go to a temporary file in the slot's directory and are then renamed
//! over the slot, so a crash mid-write never leaves a partial entry at the
//! canonical path. On Unix the directory is synced after the rename so the
//! rename itself survives power loss.
//!
//! Concurrent writers to the same slot are not coordinated unless the caller
//! takes a [`SlotLock`]: without it the last completed write wins.

use crate::codec::{Codec, JsonCodec};
use crate::config::default_cache_root;
use crate::fingerprint::{ArgFingerprint, SourceFingerprint};
use crate::{Error, Result};
use fs4::fs_std::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

const LOCK_SUFFIX: &str = "lock";
const TEMP_PREFIX: &str = ".memojar-";

/// A persisted result together with the fingerprints it was produced under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<R> {
    /// The computation's result
    pub result: R,
    /// Definition fingerprint at the time the result was produced
    pub source_fingerprint: SourceFingerprint,
    /// Input fingerprint, absent when the inputs could not be fingerprinted
    pub arg_fingerprint: Option<ArgFingerprint>,
}

/// Result of reading a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<R> {
    /// A well-formed entry
    Found(CacheEntry<R>),
    /// Nothing stored at the slot
    NotFound,
    /// Something is stored but it is not a readable entry
    Corrupt {
        /// Why the payload was rejected
        reason: String,
    },
}

/// A slot file discovered under the cache root
#[derive(Debug, Clone)]
pub struct SlotInfo {
    /// Absolute path of the slot
    pub path: PathBuf,
    /// Path relative to the cache root
    pub rel_path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
}

/// Filesystem-backed slot store
#[derive(Debug, Clone)]
pub struct CacheStore<C = JsonCodec> {
    root: PathBuf,
    codec: C,
}

impl CacheStore<JsonCodec> {
    /// Create a JSON store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_codec(root, JsonCodec)
    }

    /// Create a JSON store at the default cache root
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoWritableRoot`] when no candidate root is writable.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(default_cache_root()?))
    }
}

impl<C: Codec> CacheStore<C> {
    /// Create a store rooted at `root` using `codec`
    #[must_use]
    pub fn with_codec(root: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }

    /// Root directory of auto-derived slots
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Slot path for `identity` without touching the filesystem
    #[must_use]
    pub fn slot_path(&self, identity: &str, output: Option<&Path>) -> PathBuf {
        output.map_or_else(
            || self.root.join(slot_file_name(identity, C::EXTENSION)),
            Path::to_path_buf,
        )
    }

    /// Resolve the slot for `identity` and make sure its directory exists.
    ///
    /// An explicit `output` is used verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the slot's directory cannot be created.
    pub fn resolve_location(&self, identity: &str, output: Option<&Path>) -> Result<PathBuf> {
        let location = self.slot_path(identity, output);
        if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
            // create_dir_all tolerates directories created concurrently
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        Ok(location)
    }

    /// Read the entry stored at `location`
    pub fn load<R: DeserializeOwned>(&self, location: &Path) -> LoadOutcome<R> {
        let bytes = match fs::read(location) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::NotFound,
            Err(e) => {
                return LoadOutcome::Corrupt {
                    reason: format!("unreadable slot: {e}"),
                };
            }
        };
        match self.codec.decode::<CacheEntry<R>>(&bytes) {
            Ok(entry) => LoadOutcome::Found(entry),
            Err(e) => LoadOutcome::Corrupt {
                reason: e.to_string(),
            },
        }
    }

    /// Persist `entry` at `location`, replacing any previous entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] when the codec rejects the entry and
    /// [`Error::Io`] when the temporary file cannot be written or renamed. The
    /// previous entry, if any, is left untouched in both cases.
    pub fn store<R: Serialize>(&self, location: &Path, entry: &CacheEntry<R>) -> Result<()> {
        let bytes = self.codec.encode(entry)?;
        let dir = location
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::io(e, dir, "create_temp"))?;
        write_synced(&mut tmp, &bytes)?;
        tmp.persist(location)
            .map_err(|e| Error::io(e.error, location, "persist"))?;
        if let Err(e) = sync_dir(dir) {
            tracing::warn!(
                slot = %location.display(),
                error = %e,
                "Slot written but its directory could not be synced"
            );
        }

        tracing::trace!(slot = %location.display(), bytes = bytes.len(), "Slot written");
        Ok(())
    }

    /// Delete the slot at `location`. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the slot exists but cannot be deleted.
    pub fn remove(&self, location: &Path) -> Result<bool> {
        match fs::remove_file(location) {
            Ok(()) => {
                let _ = fs::remove_file(lock_path(location));
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(e, location, "remove_file")),
        }
    }

    /// Enumerate slots under the root written with this store's codec
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the root cannot be walked.
    pub fn list(&self) -> Result<Vec<SlotInfo>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut slots = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                Error::io(std::io::Error::other(e), path, "walk")
            })?;
            if !entry.file_type().is_file() || !is_slot_file(entry.path(), C::EXTENSION) {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|e| Error::io(std::io::Error::other(e), entry.path(), "metadata"))?;
            let rel_path = entry
                .path()
                .strip_prefix(&self.root)
                .map_or_else(|_| entry.path().to_path_buf(), Path::to_path_buf);
            slots.push(SlotInfo {
                path: entry.path().to_path_buf(),
                rel_path,
                size: meta.len(),
                modified: meta.modified().ok(),
            });
        }
        Ok(slots)
    }

    /// Delete every slot under the root. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Stops at the first slot that cannot be listed or deleted.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0usize;
        for slot in self.list()? {
            if self.remove(&slot.path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Take an exclusive advisory lock on the slot at `location`.
    ///
    /// Blocks until no other holder remains. The lock lives in a sibling
    /// `.lock` file and is released when the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the lock file cannot be created or locked.
    pub fn lock(&self, location: &Path) -> Result<SlotLock> {
        let path = lock_path(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(e, &path, "open"))?;
        FileExt::lock_exclusive(&file).map_err(|e| Error::io(e, &path, "lock_exclusive"))?;
        Ok(SlotLock { _file: file, path })
    }
}

/// Exclusive hold on a slot; released on drop
#[derive(Debug)]
pub struct SlotLock {
    _file: fs::File,
    path: PathBuf,
}

impl SlotLock {
    /// Path of the lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_synced(tmp: &mut NamedTempFile, bytes: &[u8]) -> Result<()> {
    tmp.write_all(bytes)
        .map_err(|e| Error::io(e, tmp.path(), "write_all"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(e, tmp.path(), "sync_all"))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|e| Error::io(e, dir, "sync_dir"))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn lock_path(location: &Path) -> PathBuf {
    let mut name = location.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(LOCK_SUFFIX);
    location.with_file_name(name)
}

fn is_slot_file(path: &Path, extension: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with(TEMP_PREFIX)
        && !name.starts_with('.')
        && path.extension().is_some_and(|ext| ext == extension)
}

fn is_path_safe(identity: &str) -> bool {
    !identity.is_empty()
        && !identity.starts_with('.')
        && identity
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn slot_file_name(identity: &str, extension: &str) -> String {
    if is_path_safe(identity) {
        return format!("{identity}.{extension}");
    }
    let sanitized: String = identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(identity.as_bytes());
    format!("{sanitized}-{}.{extension}", hex::encode(&digest[..8]))
}
