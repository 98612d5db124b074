//! Fingerprints of a computation's definition and of its call inputs
//!
//! A compiled program cannot read a function's source text at call time, so
//! the definition fingerprint is derived from text embedded at build time
//! (see [`source_fingerprint!`](crate::source_fingerprint)) or from an
//! explicit version tag supplied by the caller.
//!
//! # Normalization policy
//!
//! [`SourceFingerprint::from_source`] hashes the definition body only:
//!
//! - the declaration line (the first non-blank line) is dropped,
//! - trailing whitespace is trimmed from every remaining line,
//! - blank lines and full-line `//` comments are dropped.
//!
//! Editing the signature, re-indenting trailing whitespace or rewording a
//! full-line comment keeps the fingerprint. Any other change to the body,
//! including trailing comments on code lines, produces a new fingerprint.
//! Use [`SourceFingerprint::from_version`] when the signature itself matters.

use crate::canonical::{self, CanonicalError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Named inputs of a call, keyed by parameter name.
///
/// A `BTreeMap` keeps the serialized form independent of insertion order.
pub type NamedArgs = BTreeMap<String, serde_json::Value>;

/// Identity of a computation's definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFingerprint(String);

impl SourceFingerprint {
    /// Fingerprint a definition's source text.
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        let body = normalized_body(source);
        Self(hex::encode(Sha256::digest(body.as_bytes())))
    }

    /// Fingerprint an explicit version tag.
    ///
    /// Tags live in their own namespace and never collide with a
    /// fingerprint produced by [`Self::from_source`].
    #[must_use]
    pub fn from_version(tag: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"version\0");
        hasher.update(tag.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalized_body(source: &str) -> String {
    source
        .lines()
        .skip_while(|line| line.trim().is_empty())
        .skip(1)
        .map(str::trim_end)
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Identity of a call's inputs.
///
/// Positional and named inputs are hashed independently so a mismatch can be
/// attributed to either side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgFingerprint {
    /// SHA-256 of the serialized positional inputs
    pub positional: String,
    /// SHA-256 of the serialized named inputs
    pub named: String,
}

/// Fingerprint a call's inputs.
///
/// Each side is hashed through a lossless encoding: map entries are ordered by
/// key and floats keep their exact value, so `NaN`, `inf` and `-inf` are all
/// told apart. Returns `None` when either side's `Serialize` implementation
/// fails. The caller then skips argument comparison for this call instead of
/// failing it.
pub fn fingerprint_args<P, N>(positional: &P, named: &N) -> Option<ArgFingerprint>
where
    P: Serialize + ?Sized,
    N: Serialize + ?Sized,
{
    let positional = match hash_serialized(positional) {
        Ok(digest) => digest,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Positional inputs cannot be fingerprinted; argument comparison skipped for this call"
            );
            return None;
        }
    };
    let named = match hash_serialized(named) {
        Ok(digest) => digest,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Named inputs cannot be fingerprinted; argument comparison skipped for this call"
            );
            return None;
        }
    };
    Some(ArgFingerprint { positional, named })
}

fn hash_serialized<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    let bytes = canonical::encode(value)?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// Fingerprint a source file embedded at build time.
///
/// Expands to [`SourceFingerprint::from_source`] over `include_str!($path)`,
/// so the path is resolved relative to the invoking file and any edit to the
/// file rebuilds the constant.
///
/// ```rust,ignore
/// let definition = memojar_cache::source_fingerprint!("solver.rs");
/// ```
#[macro_export]
macro_rules! source_fingerprint {
    ($path:expr) => {
        $crate::SourceFingerprint::from_source(::core::include_str!($path))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const DOUBLE: &str = "fn f(x: i64) -> i64 {\n    x * 2\n}\n";

    #[test]
    fn declaration_edit_keeps_fingerprint() {
        let renamed = "fn f(value: i64) -> i64 {\n    x * 2\n}\n";
        assert_eq!(
            SourceFingerprint::from_source(DOUBLE),
            SourceFingerprint::from_source(renamed)
        );
    }

    #[test]
    fn body_edit_changes_fingerprint() {
        let tripled = "fn f(x: i64) -> i64 {\n    x * 3\n}\n";
        assert_ne!(
            SourceFingerprint::from_source(DOUBLE),
            SourceFingerprint::from_source(tripled)
        );
    }

    #[test]
    fn comment_and_whitespace_edits_keep_fingerprint() {
        let commented = "\n\nfn f(x: i64) -> i64 {\n    // doubles the input\n\n    x * 2   \n}\n";
        assert_eq!(
            SourceFingerprint::from_source(DOUBLE),
            SourceFingerprint::from_source(commented)
        );
    }

    #[test]
    fn trailing_comment_on_code_line_changes_fingerprint() {
        let annotated = "fn f(x: i64) -> i64 {\n    x * 2 // doubled\n}\n";
        assert_ne!(
            SourceFingerprint::from_source(DOUBLE),
            SourceFingerprint::from_source(annotated)
        );
    }

    #[test]
    fn version_tags_do_not_collide_with_sources() {
        assert_ne!(
            SourceFingerprint::from_version("v1"),
            SourceFingerprint::from_source("decl\nv1")
        );
        assert_eq!(
            SourceFingerprint::from_version("v1"),
            SourceFingerprint::from_version("v1")
        );
        assert_ne!(
            SourceFingerprint::from_version("v1"),
            SourceFingerprint::from_version("v2")
        );
    }

    #[test]
    fn macro_embeds_file_at_build_time() {
        let embedded = crate::source_fingerprint!("policy.rs");
        let direct = SourceFingerprint::from_source(include_str!("policy.rs"));
        assert_eq!(embedded, direct);
        assert_eq!(embedded.as_str().len(), 64);
    }

    #[test]
    fn named_args_hash_is_order_independent() {
        let mut a = NamedArgs::new();
        a.insert("start".into(), serde_json::json!("2019-01-01"));
        a.insert("end".into(), serde_json::json!("2019-02-01"));
        let mut b = NamedArgs::new();
        b.insert("end".into(), serde_json::json!("2019-02-01"));
        b.insert("start".into(), serde_json::json!("2019-01-01"));

        assert_eq!(fingerprint_args(&(1,), &a), fingerprint_args(&(1,), &b));
    }

    #[test]
    fn hash_map_inputs_hash_deterministically() {
        let a: HashMap<String, i32> = (0..32).map(|i| (format!("k{i}"), i)).collect();
        let b: HashMap<String, i32> = (0..32).rev().map(|i| (format!("k{i}"), i)).collect();
        assert_eq!(fingerprint_args(&a, &()), fingerprint_args(&b, &()));
    }

    #[test]
    fn positional_and_named_are_independent() {
        let named = NamedArgs::new();
        let one = fingerprint_args(&(2,), &named).unwrap();
        let two = fingerprint_args(&(3,), &named).unwrap();
        assert_ne!(one.positional, two.positional);
        assert_eq!(one.named, two.named);
    }

    struct Handle;

    impl Serialize for Handle {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("solver handles are not serializable"))
        }
    }

    #[test]
    fn unserializable_inputs_degrade_to_none() {
        assert!(fingerprint_args(&(1, Handle), &NamedArgs::new()).is_none());
        assert!(fingerprint_args(&(1,), &Handle).is_none());
    }

    #[test]
    fn tuple_keyed_maps_are_fingerprinted() {
        let a: HashMap<(i32, i32), f64> = (0..8).map(|i| ((i, -i), 0.5)).collect();
        let b: HashMap<(i32, i32), f64> = (0..8).rev().map(|i| ((i, -i), 0.5)).collect();
        let fa = fingerprint_args(&a, &()).unwrap();
        assert_eq!(Some(fa), fingerprint_args(&b, &()));
    }

    #[test]
    fn non_finite_inputs_are_told_apart() {
        let named = NamedArgs::new();
        let nan = fingerprint_args(&(f64::NAN,), &named).unwrap();
        let inf = fingerprint_args(&(f64::INFINITY,), &named).unwrap();
        let neg_inf = fingerprint_args(&(f64::NEG_INFINITY,), &named).unwrap();
        let missing = fingerprint_args(&(Option::<f64>::None,), &named).unwrap();
        assert_ne!(nan.positional, inf.positional);
        assert_ne!(inf.positional, neg_inf.positional);
        assert_ne!(nan.positional, neg_inf.positional);
        assert_ne!(nan.positional, missing.positional);
        assert_eq!(nan, fingerprint_args(&(f64::NAN,), &named).unwrap());
    }
}
