//! CLI-specific error types

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Failed to read config file {}", path.display())]
    #[diagnostic(
        code(memojar::cli::config_read),
        help("Check that the file exists and is readable")
    )]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}", path.display())]
    #[diagnostic(
        code(memojar::cli::config_parse),
        help("Supported keys are `cache_root` and `codec`")
    )]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Tracing initialization failed: {message}")]
    #[diagnostic(code(memojar::cli::tracing))]
    Tracing { message: String },

    #[error("No cache slot at {}", path.display())]
    #[diagnostic(
        code(memojar::cli::slot_not_found),
        help("The slot may have been cleared, or the computation never ran with this codec")
    )]
    SlotNotFound { path: PathBuf },

    #[error("Failed to render cached result")]
    #[diagnostic(code(memojar::cli::render))]
    Render {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] memojar_cache::Error),
}
