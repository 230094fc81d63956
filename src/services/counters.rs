// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registrant counters kept on race and discipline documents.
//!
//! A counter that drops to zero is removed from the document (`None`)
//! instead of being stored as `0`.

/// Counter value after one registration is added.
pub fn increment(current: Option<u32>) -> Option<u32> {
    Some(current.unwrap_or(0).saturating_add(1))
}

/// Counter value after one registration is removed.
pub fn decrement(current: Option<u32>) -> Option<u32> {
    match current.unwrap_or(0) {
        0 | 1 => None,
        n => Some(n - 1),
    }
}

/// Normalize a computed count so that zero is represented as absent.
pub fn non_zero(count: u32) -> Option<u32> {
    (count > 0).then_some(count)
}
