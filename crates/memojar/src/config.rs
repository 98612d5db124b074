//! Optional TOML defaults for the CLI

use crate::errors::CliError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Slot encoding selectable from the command line or the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Plain JSON slots (`.json`)
    #[default]
    Json,
    /// Zstandard-compressed JSON slots (`.zst`)
    Zstd,
    /// MessagePack slots (`.msgpack`), lossless for non-finite floats
    Msgpack,
}

/// Contents of a `memojar.toml` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub cache_root: Option<PathBuf>,
    pub codec: Option<CodecKind>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, CliError> {
        toml::from_str(text).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
