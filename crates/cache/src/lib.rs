//! Transparent disk-backed memoization for expensive computations
//!
//! This crate wraps long-running computations (optimizer runs, billing
//! calculations, statistical extraction) so that repeated calls with an
//! unchanged definition and unchanged inputs reuse a result persisted on disk.
//!
//! # Overview
//!
//! - [`fingerprint`]: definition and input fingerprints
//! - [`store`]: one slot file per computation, written atomically
//! - [`policy`]: the HIT / MISS / STALE decision
//! - [`memo`]: the interceptor tying them together
//!
//! ```rust,ignore
//! use memojar_cache::{CacheStore, MemoOptions, memoize, source_fingerprint};
//! use std::sync::Arc;
//!
//! let store = Arc::new(CacheStore::from_env()?);
//! let targets = memoize(
//!     &store,
//!     "monthly_targets",
//!     source_fingerprint!("targets.rs"),
//!     MemoOptions::default().verbose(true),
//!     |site: &str| run_optimizer(site),
//! );
//! let result = targets.call("site-a")?;
//! ```
//!
//! # Concurrency
//!
//! Calls are synchronous and uncoordinated by default. Two processes missing
//! on the same empty slot both compute, and the last completed write is the
//! one that persists. Enable [`MemoOptions::lock_slot`] to serialize calls on
//! a slot with an advisory file lock.

mod canonical;
pub mod codec;
pub mod config;
mod error;
pub mod events;
pub mod fingerprint;
pub mod memo;
pub mod policy;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use codec::{Codec, JsonCodec, MsgPackCodec, ZstdCodec};
pub use config::{CACHE_DIR_ENV, MemoOptions, default_cache_root};
pub use fingerprint::{ArgFingerprint, NamedArgs, SourceFingerprint, fingerprint_args};
pub use memo::{Evaluated, Memoized, memoize};
pub use policy::{Decision, MissReason, Observation, StaleReason, StoredFingerprints, decide};
pub use store::{CacheEntry, CacheStore, LoadOutcome, SlotInfo, SlotLock};
