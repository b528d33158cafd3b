//! Warning deduplication.
//!
//! Detectors run independently and can describe the same anomaly more
//! than once in a single pass. Dedup collapses them on the identity key
//! (district, street, kind, title), keeping the first occurrence. Pure
//! function, no side effects.

use std::collections::HashSet;

use crate::types::Warning;

/// Drop warnings whose identity key was already seen. Stable:
/// first-occurrence order is preserved, so `dedupe` is idempotent.
pub fn dedupe_warnings(warnings: &[Warning]) -> Vec<Warning> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for warning in warnings {
        if seen.insert(warning.identity_key()) {
            unique.push(warning.clone());
        }
    }

    unique
}
