//! memojar: inspect and clear memoized computation results

mod cli;
mod commands;
mod config;
mod errors;
mod tracing;

use crate::cli::Cli;
use crate::commands::{Command, execute};
use crate::config::{CliConfig, CodecKind};
use clap::Parser;
use memojar_cache::{CacheStore, JsonCodec, MsgPackCodec, ZstdCodec, default_cache_root};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    crate::tracing::init_tracing(cli.level.into(), cli.json)?;

    let file_config = match cli.config.as_deref() {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let root = match cli.cache_root.or(file_config.cache_root) {
        Some(root) => root,
        None => default_cache_root()?,
    };
    let codec = cli.codec.or(file_config.codec).unwrap_or_default();
    ::tracing::debug!(root = %root.display(), codec = ?codec, "Resolved cache store");

    let command = Command::from(cli.command);
    let report = match codec {
        CodecKind::Json => execute(&CacheStore::with_codec(root, JsonCodec), &command)?,
        CodecKind::Zstd => execute(
            &CacheStore::with_codec(root, ZstdCodec::<JsonCodec>::default()),
            &command,
        )?,
        CodecKind::Msgpack => execute(&CacheStore::with_codec(root, MsgPackCodec), &command)?,
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{report}");
    }
    Ok(())
}
