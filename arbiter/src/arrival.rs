//! Decide, once per arrival slot, whether a new message reaches a queue.
//!
//! An [Arrival] policy is a pure function of the supplied random source: it holds
//! only parameters and never mutates itself, so replaying the same generator
//! replays the same traffic.

use rand::Rng;

/// Policy that produces (or withholds) a message for a single arrival slot.
pub trait Arrival {
    /// Run one independent trial, returning the size of the arriving message (if any).
    fn generate<R: Rng>(&self, rng: &mut R) -> Option<u64>;
}

/// Messages arrive with fixed probability and a size drawn uniformly from an
/// inclusive range.
#[derive(Clone, Debug, PartialEq)]
pub struct Bernoulli {
    probability: f64,
    min_size: u64,
    max_size: u64,
}

impl Bernoulli {
    /// Create a new policy.
    ///
    /// # Panics
    ///
    /// Panics if `probability` is not in `[0, 1]` or if `min_size > max_size`.
    pub fn new(probability: f64, min_size: u64, max_size: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]: {probability}"
        );
        assert!(min_size <= max_size, "min_size must not exceed max_size");
        Self {
            probability,
            min_size,
            max_size,
        }
    }

    /// Probability that a single trial produces a message.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Inclusive bounds of generated message sizes.
    pub fn sizes(&self) -> (u64, u64) {
        (self.min_size, self.max_size)
    }
}

impl Arrival for Bernoulli {
    fn generate<R: Rng>(&self, rng: &mut R) -> Option<u64> {
        if rng.gen::<f64>() >= self.probability {
            return None;
        }
        Some(rng.gen_range(self.min_size..=self.max_size))
    }
}

/// Every trial produces a message of the same size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fixed(pub u64);

impl Arrival for Fixed {
    fn generate<R: Rng>(&self, _: &mut R) -> Option<u64> {
        Some(self.0)
    }
}

/// No trial ever produces a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Silent;

impl Arrival for Silent {
    fn generate<R: Rng>(&self, _: &mut R) -> Option<u64> {
        None
    }
}
