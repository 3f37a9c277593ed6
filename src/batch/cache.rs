//! Trajectory cache shared by batch calls.
//!
//! Keys compare the request bounds bit for bit, so two requests hit the same entry only
//! when they ask for exactly the same sample grid. Only successful results are stored.
use ahash::AHashMap;
use parking_lot::RwLock;

use crate::constants::{Designation, JulianDate};

use super::execution::PropagationMethod;
use super::report::TrajectoryResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    designation: Designation,
    start_bits: u64,
    end_bits: u64,
    n_points: usize,
    method: PropagationMethod,
}

impl CacheKey {
    pub fn new(
        designation: &str,
        start: JulianDate,
        end: JulianDate,
        n_points: usize,
        method: PropagationMethod,
    ) -> Self {
        CacheKey {
            designation: designation.to_string(),
            start_bits: start.to_bits(),
            end_bits: end.to_bits(),
            n_points,
            method,
        }
    }

    pub fn designation(&self) -> &str {
        &self.designation
    }
}

/// Thread-safe map of computed trajectories.
///
/// Lookups take a read lock; the scheduler inserts once per batch after all units
/// have joined.
#[derive(Debug, Default)]
pub struct TrajectoryCache {
    entries: RwLock<AHashMap<CacheKey, TrajectoryResult>>,
}

impl TrajectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored result for `key`, flagged `from_cache`.
    pub fn get(&self, key: &CacheKey) -> Option<TrajectoryResult> {
        self.entries.read().get(key).map(|result| TrajectoryResult {
            from_cache: true,
            ..result.clone()
        })
    }

    /// Store `result` if it is a success; returns whether it was stored.
    pub fn insert(&self, key: CacheKey, result: &TrajectoryResult) -> bool {
        if !result.success {
            return false;
        }
        let stored = TrajectoryResult {
            from_cache: false,
            ..result.clone()
        };
        self.entries.write().insert(key, stored);
        true
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let n = entries.len();
        entries.clear();
        tracing::info!(entries = n, "trajectory cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
