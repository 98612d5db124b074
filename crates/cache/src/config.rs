//! Memoization options and cache root resolution

use crate::{Error, Result};
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the default cache root
pub const CACHE_DIR_ENV: &str = "MEMOJAR_CACHE_DIR";

/// Per-computation caching options, bound to an interceptor at attachment time.
///
/// Deserializes with per-field defaults so a partial TOML table or JSON object
/// only needs to name the options it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoOptions {
    /// Explicit slot location. Used verbatim instead of a path derived from
    /// the computation identity.
    pub output: Option<PathBuf>,
    /// Force a recompute on every call.
    pub invalidate: bool,
    /// Compare the stored source fingerprint against the current one. When
    /// disabled, every call recomputes and refreshes the slot.
    pub detect_changes: bool,
    /// Also compare argument fingerprints.
    pub check_args: bool,
    /// Report every call outcome at INFO instead of DEBUG.
    pub verbose: bool,
    /// Hold an exclusive advisory lock on the slot for the whole call.
    pub lock_slot: bool,
}

impl Default for MemoOptions {
    fn default() -> Self {
        Self {
            output: None,
            invalidate: false,
            detect_changes: true,
            check_args: true,
            verbose: false,
            lock_slot: false,
        }
    }
}

impl MemoOptions {
    /// Set the explicit slot location
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Set forced invalidation
    #[must_use]
    pub fn invalidate(mut self, invalidate: bool) -> Self {
        self.invalidate = invalidate;
        self
    }

    /// Enable or disable source change detection
    #[must_use]
    pub fn detect_changes(mut self, detect_changes: bool) -> Self {
        self.detect_changes = detect_changes;
        self
    }

    /// Enable or disable argument comparison
    #[must_use]
    pub fn check_args(mut self, check_args: bool) -> Self {
        self.check_args = check_args;
        self
    }

    /// Enable or disable per-call outcome reporting
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enable or disable per-slot locking
    #[must_use]
    pub fn lock_slot(mut self, lock_slot: bool) -> Self {
        self.lock_slot = lock_slot;
        self
    }
}

/// Inputs for determining the cache root directory
#[derive(Debug, Clone)]
pub(crate) struct RootInputs {
    pub(crate) explicit: Option<PathBuf>,
    pub(crate) xdg_cache_home: Option<PathBuf>,
    pub(crate) os_cache_dir: Option<PathBuf>,
    pub(crate) home_dir: Option<PathBuf>,
    pub(crate) temp_dir: PathBuf,
}

impl RootInputs {
    fn from_env() -> Self {
        Self {
            explicit: non_blank_env(CACHE_DIR_ENV),
            xdg_cache_home: non_blank_env("XDG_CACHE_HOME"),
            os_cache_dir: cache_dir(),
            home_dir: home_dir(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

fn non_blank_env(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

pub(crate) fn cache_root_from_inputs(inputs: RootInputs) -> Result<PathBuf> {
    // Resolution order (first writable wins):
    // 1) MEMOJAR_CACHE_DIR (explicit override)
    // 2) XDG_CACHE_HOME/memojar/jar
    // 3) OS cache dir/memojar/jar
    // 4) ~/.memojar/jar
    // 5) TMPDIR/memojar/jar (fallback)
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs.explicit.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("memojar/jar"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("memojar/jar"));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".memojar/jar"));
    }
    candidates.push(inputs.temp_dir.join("memojar/jar"));

    for path in &candidates {
        if path.exists() {
            // Read-only cache directories show up on shared CI runners
            let marker = path.join(".write_check");
            match std::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&marker)
            {
                Ok(_) => {
                    let _ = std::fs::remove_file(&marker);
                    return Ok(path.clone());
                }
                Err(_) => continue,
            }
        }
        if std::fs::create_dir_all(path).is_ok() {
            return Ok(path.clone());
        }
    }
    Err(Error::NoWritableRoot { tried: candidates })
}

/// Resolve the default cache root from the environment.
///
/// Honours `MEMOJAR_CACHE_DIR`, then the XDG and platform cache directories,
/// then the home directory, and finally the system temp directory.
///
/// # Errors
///
/// Returns [`Error::NoWritableRoot`] when none of
/// the candidates can be created and written to.
pub fn default_cache_root() -> Result<PathBuf> {
    cache_root_from_inputs(RootInputs::from_env())
}
