//! Traffic router — per-request random choice between the two slots

use crate::rollout::Slot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Chooses a slot for each request.
///
/// Every call draws an independent sample `r` in `[0, 1)` and picks
/// `current` when `r < p`. There is no session affinity.
pub struct TrafficRouter {
    rng: Mutex<StdRng>,
}

impl TrafficRouter {
    /// Create a router seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create a deterministic router
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick a slot, sending fraction `current_probability` of calls to `current`.
    ///
    /// `0.0` always yields `candidate`; `1.0` always yields `current`.
    pub fn select(&self, current_probability: f64) -> Slot {
        let r: f64 = self.rng.lock().unwrap().random();
        if r < current_probability {
            Slot::Current
        } else {
            Slot::Candidate
        }
    }
}

impl Default for TrafficRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_fraction(router: &TrafficRouter, p: f64, trials: usize) -> f64 {
        let hits = (0..trials)
            .filter(|_| router.select(p) == Slot::Current)
            .count();
        hits as f64 / trials as f64
    }

    #[test]
    fn test_zero_always_candidate() {
        let router = TrafficRouter::with_seed(7);
        for _ in 0..10_000 {
            assert_eq!(router.select(0.0), Slot::Candidate);
        }
    }

    #[test]
    fn test_one_always_current() {
        let router = TrafficRouter::with_seed(7);
        for _ in 0..10_000 {
            assert_eq!(router.select(1.0), Slot::Current);
        }
    }

    #[test]
    fn test_80_20_split_converges() {
        let router = TrafficRouter::with_seed(42);
        let fraction = current_fraction(&router, 0.8, 100_000);
        assert!(
            (0.79..=0.81).contains(&fraction),
            "observed current fraction {}",
            fraction
        );
    }

    #[test]
    fn test_split_converges_across_probabilities() {
        let router = TrafficRouter::with_seed(1234);
        for p in [0.1, 0.25, 0.5, 0.9] {
            let fraction = current_fraction(&router, p, 100_000);
            assert!((fraction - p).abs() < 0.01, "p={} observed {}", p, fraction);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = TrafficRouter::with_seed(99);
        let b = TrafficRouter::with_seed(99);
        let seq_a: Vec<_> = (0..256).map(|_| a.select(0.5)).collect();
        let seq_b: Vec<_> = (0..256).map(|_| b.select(0.5)).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_entropy_router_mixes() {
        let router = TrafficRouter::default();
        let fraction = current_fraction(&router, 0.5, 10_000);
        assert!(fraction > 0.4 && fraction < 0.6);
    }

    #[test]
    fn test_router_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TrafficRouter>();
    }
}
