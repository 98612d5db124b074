//! Property-based tests for fingerprint stability and sensitivity.
//!
//! - Determinism: the same definition or inputs always fingerprint the same
//! - Sensitivity: a changed body line or a changed input changes the fingerprint
//! - Declaration independence: rewriting the declaration line never matters

use memojar_cache::{NamedArgs, SourceFingerprint, fingerprint_args};
use proptest::prelude::*;

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate a declaration line such as `fn solve(a: f64) -> f64 {`
fn declaration_strategy() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9_]{0,12}", "[a-z]{1,6}")
        .prop_map(|(name, param)| format!("fn {name}({param}: f64) -> f64 {{"))
}

/// Generate non-comment body lines
fn body_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("    [a-z0-9 +*/=;]{1,20}[a-z0-9;]", 1..6)
}

/// Generate named inputs
fn named_strategy() -> impl Strategy<Value = NamedArgs> {
    prop::collection::btree_map(
        "[a-z_]{1,10}",
        prop_oneof![
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-z0-9-]{0,12}".prop_map(serde_json::Value::from),
            any::<bool>().prop_map(serde_json::Value::from),
        ],
        0..4,
    )
}

fn source(declaration: &str, body: &[String]) -> String {
    let mut text = String::from(declaration);
    for line in body {
        text.push('\n');
        text.push_str(line);
    }
    text.push_str("\n}\n");
    text
}

// =============================================================================
// Property Tests: Source fingerprints
// =============================================================================

proptest! {
    /// Contract: fingerprinting is a pure function of the text
    #[test]
    fn source_fingerprint_is_deterministic(decl in declaration_strategy(), body in body_strategy()) {
        let text = source(&decl, &body);
        prop_assert_eq!(
            SourceFingerprint::from_source(&text),
            SourceFingerprint::from_source(&text)
        );
    }

    /// Contract: the declaration line never affects the fingerprint
    #[test]
    fn declaration_line_is_ignored(
        a in declaration_strategy(),
        b in declaration_strategy(),
        body in body_strategy(),
    ) {
        prop_assert_eq!(
            SourceFingerprint::from_source(&source(&a, &body)),
            SourceFingerprint::from_source(&source(&b, &body))
        );
    }

    /// Contract: appending a body statement changes the fingerprint
    #[test]
    fn body_edit_changes_fingerprint(
        decl in declaration_strategy(),
        body in body_strategy(),
        extra in "    [a-z]{1,8} = [0-9]{1,4};",
    ) {
        let mut edited = body.clone();
        edited.push(extra);
        prop_assert_ne!(
            SourceFingerprint::from_source(&source(&decl, &body)),
            SourceFingerprint::from_source(&source(&decl, &edited))
        );
    }

    /// Contract: inserting full-line comments keeps the fingerprint
    #[test]
    fn full_line_comments_are_ignored(
        decl in declaration_strategy(),
        body in body_strategy(),
        comment in "    // [a-zA-Z ]{0,30}",
        at in any::<prop::sample::Index>(),
    ) {
        let mut commented = body.clone();
        commented.insert(at.index(body.len() + 1), comment);
        prop_assert_eq!(
            SourceFingerprint::from_source(&source(&decl, &body)),
            SourceFingerprint::from_source(&source(&decl, &commented))
        );
    }
}

// =============================================================================
// Property Tests: Argument fingerprints
// =============================================================================

proptest! {
    /// Contract: identical inputs always fingerprint identically
    #[test]
    fn arg_fingerprint_is_deterministic(
        positional in (any::<i64>(), "[a-z]{0,8}", any::<bool>()),
        named in named_strategy(),
    ) {
        let cloned = named.clone();
        prop_assert_eq!(
            fingerprint_args(&positional, &named),
            fingerprint_args(&positional, &cloned)
        );
    }

    /// Contract: different positional inputs produce different fingerprints
    #[test]
    fn positional_change_is_detected(a in any::<i64>(), b in any::<i64>(), named in named_strategy()) {
        prop_assume!(a != b);
        let fa = fingerprint_args(&(a,), &named).unwrap();
        let fb = fingerprint_args(&(b,), &named).unwrap();
        prop_assert_ne!(fa.positional, fb.positional);
        prop_assert_eq!(fa.named, fb.named);
    }

    /// Contract: adding a named input changes only the named fingerprint
    #[test]
    fn named_change_is_detected(x in any::<i64>(), named in named_strategy(), extra in any::<i64>()) {
        let mut extended = named.clone();
        extended.insert("zz_extra_input".to_string(), serde_json::Value::from(extra));
        let before = fingerprint_args(&(x,), &named).unwrap();
        let after = fingerprint_args(&(x,), &extended).unwrap();
        prop_assert_eq!(before.positional, after.positional);
        prop_assert_ne!(before.named, after.named);
    }
}
