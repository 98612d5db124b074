//! Operational commands over a cache root
//!
//! Each command renders its report into a `String`; `main` decides where it
//! goes.

use chrono::{DateTime, Local};
use crate::errors::CliError;
use memojar_cache::{CacheStore, Codec, LoadOutcome};
use std::fmt::Write;
use std::path::PathBuf;

const PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    Slot {
        name: String,
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Inspect {
        name: String,
        output: Option<PathBuf>,
        full: bool,
    },
    Path {
        name: String,
    },
    Clear(ClearTarget),
}

pub fn execute<C: Codec>(store: &CacheStore<C>, command: &Command) -> Result<String, CliError> {
    match command {
        Command::List => list(store),
        Command::Inspect { name, output, full } => inspect(store, name, output.clone(), *full),
        Command::Path { name } => Ok(store.slot_path(name, None).display().to_string()),
        Command::Clear(target) => clear(store, target),
    }
}

fn list<C: Codec>(store: &CacheStore<C>) -> Result<String, CliError> {
    let slots = store.list()?;
    if slots.is_empty() {
        return Ok(format!("No cache slots under {}", store.root().display()));
    }
    let mut out = String::new();
    for slot in &slots {
        let modified = slot.modified.map_or_else(
            || "-".to_string(),
            |t| {
                DateTime::<Local>::from(t)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        );
        let _ = writeln!(
            out,
            "{}\t{} B\t{}",
            slot.rel_path.display(),
            slot.size,
            modified
        );
    }
    let _ = write!(out, "{} slot(s) under {}", slots.len(), store.root().display());
    Ok(out)
}

fn inspect<C: Codec>(
    store: &CacheStore<C>,
    name: &str,
    output: Option<PathBuf>,
    full: bool,
) -> Result<String, CliError> {
    let location = store.slot_path(name, output.as_deref());
    match store.load::<serde_json::Value>(&location) {
        LoadOutcome::Found(entry) => {
            let mut result = serde_json::to_string_pretty(&entry.result)
                .map_err(|source| CliError::Render { source })?;
            if !full && result.chars().count() > PREVIEW_CHARS {
                result = result.chars().take(PREVIEW_CHARS).collect();
                result.push_str("\n... (truncated, use --full)");
            }
            let mut out = String::new();
            let _ = writeln!(out, "slot: {}", location.display());
            let _ = writeln!(out, "source fingerprint: {}", entry.source_fingerprint);
            match &entry.arg_fingerprint {
                Some(args) => {
                    let _ = writeln!(out, "positional fingerprint: {}", args.positional);
                    let _ = writeln!(out, "named fingerprint: {}", args.named);
                }
                None => {
                    let _ = writeln!(out, "argument fingerprint: not recorded");
                }
            }
            let _ = write!(out, "result:\n{result}");
            Ok(out)
        }
        LoadOutcome::NotFound => Err(CliError::SlotNotFound { path: location }),
        LoadOutcome::Corrupt { reason } => Ok(format!(
            "slot: {}\nstatus: corrupt ({reason}); the next call will recompute it",
            location.display()
        )),
    }
}

fn clear<C: Codec>(store: &CacheStore<C>, target: &ClearTarget) -> Result<String, CliError> {
    match target {
        ClearTarget::All => {
            let removed = store.clear()?;
            tracing::info!(removed, root = %store.root().display(), "Cleared cache root");
            Ok(format!(
                "Removed {removed} slot(s) from {}",
                store.root().display()
            ))
        }
        ClearTarget::Slot { name, output } => {
            let location = store.slot_path(name, output.as_deref());
            if store.remove(&location)? {
                tracing::info!(slot = %location.display(), "Removed slot");
                Ok(format!("Removed {}", location.display()))
            } else {
                Ok(format!("No slot at {}", location.display()))
            }
        }
    }
}
