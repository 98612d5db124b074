//! Structured slot events
//!
//! Every memoized call reports its outcome through these macros so that
//! subscribers can filter on the `memojar::slot` target and the
//! `event_type` field. Verbose interceptors log at INFO, quiet ones at DEBUG.

/// Target shared by all slot events
pub const TARGET: &str = "memojar::slot";

/// Emit a slot hit event.
///
/// # Example
/// ```rust,ignore
/// emit_slot_hit!(verbose, "load_data", location.display());
/// ```
#[macro_export]
macro_rules! emit_slot_hit {
    ($verbose:expr, $name:expr, $slot:expr) => {
        if $verbose {
            ::tracing::info!(
                target: $crate::events::TARGET,
                event_type = "slot.hit",
                computation = %$name,
                slot = %$slot,
                "Computation '{}' unchanged, reusing cached result",
                $name,
            )
        } else {
            ::tracing::debug!(
                target: $crate::events::TARGET,
                event_type = "slot.hit",
                computation = %$name,
                slot = %$slot,
            )
        }
    };
}

/// Emit a slot miss event (empty, corrupt, forced or untracked).
#[macro_export]
macro_rules! emit_slot_miss {
    ($verbose:expr, $name:expr, $slot:expr, $decision:expr) => {
        if $verbose {
            ::tracing::info!(
                target: $crate::events::TARGET,
                event_type = "slot.miss",
                computation = %$name,
                slot = %$slot,
                decision = %$decision,
                "Computation '{}': {}, computing",
                $name,
                $decision,
            )
        } else {
            ::tracing::debug!(
                target: $crate::events::TARGET,
                event_type = "slot.miss",
                computation = %$name,
                slot = %$slot,
                decision = %$decision,
            )
        }
    };
}

/// Emit a slot stale event naming the comparison that failed.
#[macro_export]
macro_rules! emit_slot_stale {
    ($verbose:expr, $name:expr, $slot:expr, $decision:expr) => {
        if $verbose {
            ::tracing::info!(
                target: $crate::events::TARGET,
                event_type = "slot.stale",
                computation = %$name,
                slot = %$slot,
                decision = %$decision,
                "Computation '{}': {}, invalidating cached result",
                $name,
                $decision,
            )
        } else {
            ::tracing::debug!(
                target: $crate::events::TARGET,
                event_type = "slot.stale",
                computation = %$name,
                slot = %$slot,
                decision = %$decision,
            )
        }
    };
}

/// Emit a slot stored event.
#[macro_export]
macro_rules! emit_slot_stored {
    ($name:expr, $slot:expr) => {
        ::tracing::debug!(
            target: $crate::events::TARGET,
            event_type = "slot.stored",
            computation = %$name,
            slot = %$slot,
        )
    };
}
