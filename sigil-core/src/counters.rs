//! Shared observability and naming counters.
//!
//! Symbolic leaf names get a process-unique suffix from `next_name_id`, and
//! the solver backend bumps `record_solve`/`record_cache_hit` around each
//! satisfiability check. The counters are injected explicitly (an `Arc`
//! shared between the engine and any solver backends) rather than living in
//! a global, so tests can construct a fresh set and get deterministic names.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by an engine and its solver backends.
///
/// All increments are atomic; a `Counters` value may be read concurrently
/// by any monitoring component.
#[derive(Debug, Default)]
pub struct Counters {
    names: AtomicU64,
    solves: AtomicU64,
    cache_hits: AtomicU64,
}

impl Counters {
    /// Create a fresh counter set, all zeros.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique id for a symbolic leaf name.
    pub fn next_name_id(&self) -> u64 {
        self.names.fetch_add(1, Ordering::Relaxed)
    }

    /// Record one satisfiability check.
    pub fn record_solve(&self) {
        self.solves.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one reuse of an already-extracted model.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of satisfiability checks issued so far.
    #[must_use]
    pub fn solve_count(&self) -> u64 {
        self.solves.load(Ordering::Relaxed)
    }

    /// Number of model reuses so far.
    #[must_use]
    pub fn cache_hit_count(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Number of unique leaf names handed out so far.
    #[must_use]
    pub fn name_count(&self) -> u64 {
        self.names.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_ids_are_unique_and_monotonic() {
        let c = Counters::new();
        let a = c.next_name_id();
        let b = c.next_name_id();
        assert!(b > a);
        assert_eq!(c.name_count(), 2);
    }

    #[test]
    fn solve_and_cache_counters_are_independent() {
        let c = Counters::new();
        c.record_solve();
        c.record_solve();
        c.record_cache_hit();
        assert_eq!(c.solve_count(), 2);
        assert_eq!(c.cache_hit_count(), 1);
    }
}
