//! Reuse-or-recompute decision for a loaded slot

use crate::config::MemoOptions;
use crate::fingerprint::{ArgFingerprint, SourceFingerprint};
use crate::store::{CacheEntry, LoadOutcome};
use std::fmt;

/// Why a call computes for the first time (or as if it were the first time)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The slot is empty
    Empty,
    /// The slot held an unreadable payload
    Corrupt,
    /// `invalidate` is set
    Forced,
    /// `detect_changes` is off, so the entry is always refreshed
    Untracked,
}

/// Which comparison failed for a stale entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The definition changed since the entry was produced
    SourceChanged,
    /// The inputs differ from the ones the entry was produced with
    ArgsChanged,
    /// The entry was produced without an input fingerprint
    ArgsUnrecorded,
}

/// Outcome of the invalidation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Reuse the stored result
    Hit,
    /// Compute; there is nothing usable to compare against
    Miss(MissReason),
    /// Compute; the stored result no longer matches
    Stale(StaleReason),
}

impl Decision {
    /// Whether the stored result is reused
    #[must_use]
    pub const fn is_hit(self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => f.write_str("HIT"),
            Self::Miss(MissReason::Empty) => f.write_str("MISS (empty slot)"),
            Self::Miss(MissReason::Corrupt) => f.write_str("MISS (corrupt entry)"),
            Self::Miss(MissReason::Forced) => f.write_str("MISS (forced)"),
            Self::Miss(MissReason::Untracked) => f.write_str("MISS (changes untracked)"),
            Self::Stale(StaleReason::SourceChanged) => f.write_str("STALE (source changed)"),
            Self::Stale(StaleReason::ArgsChanged) => f.write_str("STALE (arguments changed)"),
            Self::Stale(StaleReason::ArgsUnrecorded) => {
                f.write_str("STALE (arguments not recorded)")
            }
        }
    }
}

/// What the policy compares for one call
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Stored entry fingerprints, `None` when the slot is empty
    pub stored: Option<StoredFingerprints<'a>>,
    /// Whether the slot held an unreadable payload
    pub corrupt: bool,
    /// Current definition fingerprint
    pub source: &'a SourceFingerprint,
    /// Current input fingerprint, `None` when it could not be computed
    pub args: Option<&'a ArgFingerprint>,
}

/// Fingerprints recorded with a stored entry
#[derive(Debug, Clone, Copy)]
pub struct StoredFingerprints<'a> {
    /// Definition fingerprint at store time
    pub source: &'a SourceFingerprint,
    /// Input fingerprint at store time
    pub args: Option<&'a ArgFingerprint>,
}

impl<'a> Observation<'a> {
    /// Build an observation from a load outcome and the current fingerprints
    #[must_use]
    pub fn new<R>(
        loaded: &'a LoadOutcome<R>,
        source: &'a SourceFingerprint,
        args: Option<&'a ArgFingerprint>,
    ) -> Self {
        let stored = match loaded {
            LoadOutcome::Found(entry) => Some(StoredFingerprints::of(entry)),
            LoadOutcome::NotFound | LoadOutcome::Corrupt { .. } => None,
        };
        Self {
            stored,
            corrupt: matches!(loaded, LoadOutcome::Corrupt { .. }),
            source,
            args,
        }
    }
}

impl<'a> StoredFingerprints<'a> {
    fn of<R>(entry: &'a CacheEntry<R>) -> Self {
        Self {
            source: &entry.source_fingerprint,
            args: entry.arg_fingerprint.as_ref(),
        }
    }
}

/// Decide whether a stored entry can be reused.
///
/// A hit requires change detection to be on, the definition fingerprints to
/// match and, when `check_args` is set, the input fingerprints to match. If
/// the current inputs could not be fingerprinted the argument comparison is
/// skipped for this call.
#[must_use]
pub fn decide(observation: &Observation<'_>, options: &MemoOptions) -> Decision {
    let Some(stored) = observation.stored else {
        return if observation.corrupt {
            Decision::Miss(MissReason::Corrupt)
        } else {
            Decision::Miss(MissReason::Empty)
        };
    };
    if options.invalidate {
        return Decision::Miss(MissReason::Forced);
    }
    if !options.detect_changes {
        return Decision::Miss(MissReason::Untracked);
    }
    if stored.source != observation.source {
        return Decision::Stale(StaleReason::SourceChanged);
    }
    if options.check_args {
        match (stored.args, observation.args) {
            (_, None) => {}
            (None, Some(_)) => return Decision::Stale(StaleReason::ArgsUnrecorded),
            (Some(before), Some(now)) if before != now => {
                return Decision::Stale(StaleReason::ArgsChanged);
            }
            (Some(_), Some(_)) => {}
        }
    }
    Decision::Hit
}
