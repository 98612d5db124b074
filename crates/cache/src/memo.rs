//! The memoizing interceptor
//!
//! [`Memoized`] wraps one computation and keeps its calling contract: the
//! same inputs, the same result type and the same error type. On every call it
//! resolves the computation's slot, loads any stored entry, fingerprints the
//! current inputs and either returns the stored result or runs the
//! computation exactly once and persists the new entry.
//!
//! Cache-layer failures never reach the caller. A corrupt entry is treated as
//! absent, unfingerprintable inputs skip argument comparison, and a failed
//! write is logged while the freshly computed result is still returned. Only
//! the wrapped computation's own error propagates, and in that case nothing
//! is written.
//!
//! Each call runs synchronously to completion. There is no timeout, retry or
//! in-memory layer: every call reads the slot from disk.

use crate::codec::{Codec, JsonCodec};
use crate::config::MemoOptions;
use crate::fingerprint::{NamedArgs, SourceFingerprint, fingerprint_args};
use crate::policy::{Decision, Observation, decide};
use crate::store::{CacheEntry, CacheStore, LoadOutcome, SlotLock};
use crate::{emit_slot_hit, emit_slot_miss, emit_slot_stale, emit_slot_stored};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// A call's result together with how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated<R> {
    /// The result, either reused or freshly computed
    pub value: R,
    /// The invalidation policy outcome for this call
    pub decision: Decision,
}

/// A computation wrapped with disk-backed memoization
#[derive(Debug, Clone)]
pub struct Memoized<F, C = JsonCodec> {
    name: String,
    definition: SourceFingerprint,
    options: MemoOptions,
    store: Arc<CacheStore<C>>,
    func: F,
}

/// Attach memoization to `func`.
///
/// `name` identifies the computation's slot under the store's root and
/// `definition` fingerprints its current definition.
pub fn memoize<F, C: Codec>(
    store: &Arc<CacheStore<C>>,
    name: impl Into<String>,
    definition: SourceFingerprint,
    options: MemoOptions,
    func: F,
) -> Memoized<F, C> {
    Memoized::new(Arc::clone(store), name, definition, func).options(options)
}

impl<F, C: Codec> Memoized<F, C> {
    /// Wrap `func` with default options
    pub fn new(
        store: Arc<CacheStore<C>>,
        name: impl Into<String>,
        definition: SourceFingerprint,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            definition,
            options: MemoOptions::default(),
            store,
            func,
        }
    }

    /// Replace the options
    #[must_use]
    pub fn options(mut self, options: MemoOptions) -> Self {
        self.options = options;
        self
    }

    /// Computation identity
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current definition fingerprint
    #[must_use]
    pub fn definition(&self) -> &SourceFingerprint {
        &self.definition
    }

    /// Options bound to this computation
    #[must_use]
    pub fn memo_options(&self) -> &MemoOptions {
        &self.options
    }

    /// Slot path this computation reads and writes
    #[must_use]
    pub fn location(&self) -> PathBuf {
        self.store
            .slot_path(&self.name, self.options.output.as_deref())
    }

    /// Call a computation that takes positional inputs only
    ///
    /// # Errors
    ///
    /// Only the wrapped computation's own error is returned; nothing is
    /// stored in that case.
    pub fn call<A, R, E>(&self, args: &A) -> Result<R, E>
    where
        F: Fn(&A) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        self.call_traced(args).map(|evaluated| evaluated.value)
    }

    /// Like [`Self::call`], also reporting the policy outcome
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub fn call_traced<A, R, E>(&self, args: &A) -> Result<Evaluated<R>, E>
    where
        F: Fn(&A) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        self.evaluate(args, &NamedArgs::new(), || (self.func)(args))
    }

    /// Call a computation that takes positional and named inputs
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub fn call_named<A, R, E>(&self, args: &A, named: &NamedArgs) -> Result<R, E>
    where
        F: Fn(&A, &NamedArgs) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        self.call_named_traced(args, named)
            .map(|evaluated| evaluated.value)
    }

    /// Like [`Self::call_named`], also reporting the policy outcome
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub fn call_named_traced<A, R, E>(
        &self,
        args: &A,
        named: &NamedArgs,
    ) -> Result<Evaluated<R>, E>
    where
        F: Fn(&A, &NamedArgs) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        self.evaluate(args, named, || (self.func)(args, named))
    }

    fn evaluate<A, R, E>(
        &self,
        positional: &A,
        named: &NamedArgs,
        compute: impl FnOnce() -> Result<R, E>,
    ) -> Result<Evaluated<R>, E>
    where
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        let location = match self
            .store
            .resolve_location(&self.name, self.options.output.as_deref())
        {
            Ok(location) => Some(location),
            Err(e) => {
                warn!(
                    computation = %self.name,
                    error = %e,
                    "Cache slot unavailable; computing without caching"
                );
                None
            }
        };
        let slot = location
            .as_deref()
            .map_or_else(|| "<unavailable>".to_string(), |p| p.display().to_string());

        // Held until the new entry is persisted
        let _guard = location
            .as_deref()
            .filter(|_| self.options.lock_slot)
            .and_then(|l| self.lock(l));

        let loaded = location
            .as_deref()
            .map_or(LoadOutcome::NotFound, |l| self.store.load::<R>(l));
        if let LoadOutcome::Corrupt { reason } = &loaded {
            warn!(
                computation = %self.name,
                slot = %slot,
                reason = %reason,
                "Issue parsing cached entry, recomputing"
            );
        }

        let args = fingerprint_args(positional, named);
        let decision = decide(
            &Observation::new(&loaded, &self.definition, args.as_ref()),
            &self.options,
        );
        match decision {
            Decision::Hit => emit_slot_hit!(self.options.verbose, self.name, slot),
            Decision::Miss(_) => emit_slot_miss!(self.options.verbose, self.name, slot, decision),
            Decision::Stale(_) => {
                emit_slot_stale!(self.options.verbose, self.name, slot, decision);
            }
        }

        if let (Decision::Hit, LoadOutcome::Found(entry)) = (decision, loaded) {
            return Ok(Evaluated {
                value: entry.result,
                decision,
            });
        }

        let entry = CacheEntry {
            result: compute()?,
            source_fingerprint: self.definition.clone(),
            arg_fingerprint: args,
        };
        if let Some(location) = location.as_deref() {
            self.persist(location, &entry);
        }
        Ok(Evaluated {
            value: entry.result,
            decision,
        })
    }

    fn lock(&self, location: &Path) -> Option<SlotLock> {
        match self.store.lock(location) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(
                    computation = %self.name,
                    error = %e,
                    "Failed to lock cache slot; continuing unlocked"
                );
                None
            }
        }
    }

    fn persist<R: Serialize>(&self, location: &Path, entry: &CacheEntry<R>) {
        match self.store.store(location, entry) {
            Ok(()) => emit_slot_stored!(self.name, location.display()),
            Err(e) => warn!(
                computation = %self.name,
                slot = %location.display(),
                error = %e,
                "Failed to persist cache entry; returning computed result"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MissReason, StaleReason};
    use std::cell::Cell;
    use std::convert::Infallible;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> Arc<CacheStore> {
        Arc::new(CacheStore::new(tmp.path().join("jar")))
    }

    #[test]
    fn second_identical_call_is_a_hit() {
        let tmp = TempDir::new().unwrap();
        let runs = Cell::new(0);
        let square = Memoized::new(
            store(&tmp),
            "square",
            SourceFingerprint::from_version("1"),
            |x: &i64| {
                runs.set(runs.get() + 1);
                Ok::<_, Infallible>(x * x)
            },
        );

        let first = square.call_traced(&7_i64).unwrap();
        assert_eq!(first.value, 49);
        assert_eq!(first.decision, Decision::Miss(MissReason::Empty));

        let second = square.call_traced(&7_i64).unwrap();
        assert_eq!(second.value, 49);
        assert_eq!(second.decision, Decision::Hit);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn named_inputs_participate_in_arg_check() {
        let tmp = TempDir::new().unwrap();
        let runs = Cell::new(0);
        let window = Memoized::new(
            store(&tmp),
            "window",
            SourceFingerprint::from_version("1"),
            |site: &str, named: &NamedArgs| {
                runs.set(runs.get() + 1);
                let days = named.get("days").and_then(serde_json::Value::as_u64);
                Ok::<_, Infallible>(format!("{site}:{}", days.unwrap_or(0)))
            },
        );

        let mut named = NamedArgs::new();
        named.insert("days".into(), serde_json::json!(30));
        assert_eq!(window.call_named("site-a", &named).unwrap(), "site-a:30");
        assert_eq!(window.call_named("site-a", &named).unwrap(), "site-a:30");
        assert_eq!(runs.get(), 1);

        named.insert("days".into(), serde_json::json!(7));
        let changed = window.call_named_traced("site-a", &named).unwrap();
        assert_eq!(changed.value, "site-a:7");
        assert_eq!(changed.decision, Decision::Stale(StaleReason::ArgsChanged));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn failing_computation_leaves_previous_entry() {
        let tmp = TempDir::new().unwrap();
        let shared = store(&tmp);
        let ok = Memoized::new(
            Arc::clone(&shared),
            "solve",
            SourceFingerprint::from_version("1"),
            |x: &u32| Ok::<_, String>(x + 1),
        );
        assert_eq!(ok.call(&1_u32), Ok(2));
        let before = std::fs::read(ok.location()).unwrap();

        let failing = Memoized::new(
            shared,
            "solve",
            SourceFingerprint::from_version("2"),
            |_: &u32| Err::<u32, _>("solver diverged".to_string()),
        );
        assert_eq!(failing.call(&1_u32), Err("solver diverged".to_string()));
        assert_eq!(std::fs::read(failing.location()).unwrap(), before);
    }

    #[test]
    fn unusable_slot_still_returns_result() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let runs = Cell::new(0);
        let f = Memoized::new(
            store(&tmp),
            "f",
            SourceFingerprint::from_version("1"),
            |x: &i32| {
                runs.set(runs.get() + 1);
                Ok::<_, Infallible>(x * 2)
            },
        )
        .options(MemoOptions::default().output(blocker.join("slot.json")));

        assert_eq!(f.call(&4).unwrap(), 8);
        assert_eq!(f.call(&4).unwrap(), 8);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn locked_calls_behave_like_unlocked() {
        let tmp = TempDir::new().unwrap();
        let runs = Cell::new(0);
        let f = Memoized::new(
            store(&tmp),
            "locked",
            SourceFingerprint::from_version("1"),
            |x: &i32| {
                runs.set(runs.get() + 1);
                Ok::<_, Infallible>(x + 10)
            },
        )
        .options(MemoOptions::default().lock_slot(true));

        assert_eq!(f.call(&1).unwrap(), 11);
        assert_eq!(f.call(&1).unwrap(), 11);
        assert_eq!(runs.get(), 1);
        assert!(tmp.path().join("jar/locked.json.lock").exists());
    }

    #[test]
    fn memoize_binds_options() {
        let tmp = TempDir::new().unwrap();
        let shared = store(&tmp);
        let f = memoize(
            &shared,
            "bound",
            SourceFingerprint::from_version("1"),
            MemoOptions::default().verbose(true),
            |x: &i32| Ok::<_, Infallible>(*x),
        );
        assert!(f.memo_options().verbose);
        assert_eq!(f.name(), "bound");
        assert_eq!(f.definition(), &SourceFingerprint::from_version("1"));
        assert_eq!(f.location(), tmp.path().join("jar/bound.json"));
    }
}
