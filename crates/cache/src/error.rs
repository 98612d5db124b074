//! Error types for the memoization core

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for cache store operations.
///
/// These never escape a memoized call: the interceptor downgrades them to
/// warnings. They are surfaced by the store's direct API and by the CLI.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A filesystem operation on a slot, lock or root failed
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(
        code(memojar::cache::io),
        help("Check file permissions and free space under the cache root")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path the operation was applied to
        path: Box<Path>,
        /// Operation that failed (e.g., "persist", "create_dir_all")
        operation: &'static str,
    },

    /// None of the candidate cache roots could be created and written to
    #[error("No writable cache root among {} candidate(s)", tried.len())]
    #[diagnostic(
        code(memojar::cache::no_writable_root),
        help("Point MEMOJAR_CACHE_DIR at a writable directory")
    )]
    NoWritableRoot {
        /// Candidates in the order they were tried
        tried: Vec<PathBuf>,
    },

    /// A codec could not encode an entry
    #[error("Failed to encode {format} entry: {message}")]
    #[diagnostic(code(memojar::cache::encode))]
    Encode {
        /// Slot format (the codec's file extension)
        format: &'static str,
        /// Underlying encoder message
        message: String,
    },

    /// A codec could not decode a slot's bytes
    #[error("Failed to decode {format} entry: {message}")]
    #[diagnostic(
        code(memojar::cache::decode),
        help("The slot is treated as corrupt and recomputed on the next call")
    )]
    Decode {
        /// Slot format (the codec's file extension)
        format: &'static str,
        /// Underlying decoder message
        message: String,
    },
}

impl Error {
    /// Wrap an I/O error with the path and operation it came from
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: &'static str) -> Self {
        Self::Io {
            source,
            path: path.as_ref().into(),
            operation,
        }
    }

    /// Create an encode error for `format`
    #[must_use]
    pub fn encode(format: &'static str, message: impl ToString) -> Self {
        Self::Encode {
            format,
            message: message.to_string(),
        }
    }

    /// Create a decode error for `format`
    #[must_use]
    pub fn decode(format: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            format,
            message: message.to_string(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
