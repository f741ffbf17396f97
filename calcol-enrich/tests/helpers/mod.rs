//! Test Helper Utilities
//!
//! Shared fixtures for calcol-enrich integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod mock_providers;

pub use db_utils::{create_test_storage, seed_entry};
pub use mock_providers::{Behavior, MockGenerative, MockMuseum, MockSearch, MockStructured};

use calcol_enrich::quota::{QuotaGuard, QuotaKey, QuotaLimits};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const UNTHROTTLED: u32 = 10_000;

/// Quota guard that never rate-limits back-to-back test calls
///
/// Rates above 1000/s give a zero admission interval.
pub fn generous_quota() -> Arc<QuotaGuard> {
    quota_with(&[])
}

/// Generous limits except for the listed overrides
pub fn quota_with(overrides: &[(QuotaKey, QuotaLimits)]) -> Arc<QuotaGuard> {
    let mut limits: BTreeMap<QuotaKey, QuotaLimits> = QuotaKey::ALL
        .iter()
        .map(|&key| (key, QuotaLimits::new(UNTHROTTLED, 10_000)))
        .collect();
    for (key, limit) in overrides {
        limits.insert(*key, *limit);
    }
    Arc::new(QuotaGuard::new(&limits))
}
