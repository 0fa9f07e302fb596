use crate::{Error, CREDIT_UNIT};
use serde::{Deserialize, Serialize};

/// Configuration for an [crate::Arbiter] built with [crate::Arbiter::new].
///
/// Bandwidth is handed out in two phases: every queue first receives `min_bandwidth`,
/// then `increase_bandwidth` increments are granted to uniformly random queues until less
/// than one increment remains. Any remainder smaller than `increase_bandwidth` is never
/// allocated (the shared buffer is still sized from `total_bandwidth`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of queues sharing the port.
    pub queues: usize,

    /// Bandwidth of the port. The shared buffer holds `total_bandwidth * 64` bytes per cycle.
    pub total_bandwidth: u64,

    /// Bandwidth guaranteed to every queue.
    pub min_bandwidth: u64,

    /// Granularity at which the bandwidth left after minimum guarantees is distributed.
    pub increase_bandwidth: u64,

    /// Number of arrival trials each queue runs per cycle.
    pub receive_time: usize,

    /// Mean of the normal distribution arrival probabilities are drawn from.
    pub probability_mean: f64,

    /// Standard deviation of the normal distribution arrival probabilities are drawn from.
    ///
    /// Draws are clamped to `[0, 1]`.
    pub probability_std: f64,

    /// Smallest message that can arrive (inclusive).
    pub min_size: u64,

    /// Largest message that can arrive (inclusive).
    pub max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queues: 32,
            total_bandwidth: 1024,
            min_bandwidth: 16,
            increase_bandwidth: 4,
            receive_time: 3,
            probability_mean: 0.8,
            probability_std: 0.1,
            min_size: 64,
            max_size: 1500,
        }
    }
}

impl Config {
    /// Check every parameter, returning the first violation found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.queues == 0 {
            return Err(Error::NoQueues);
        }
        if self.total_bandwidth == 0 {
            return Err(Error::ZeroBandwidth);
        }
        if self.min_bandwidth == 0 {
            return Err(Error::ZeroMinBandwidth);
        }
        if self.increase_bandwidth == 0 {
            return Err(Error::ZeroIncrease);
        }
        if self.receive_time == 0 {
            return Err(Error::ZeroReceiveTime);
        }
        capacity(self.total_bandwidth)?;
        let reserved = (self.queues as u64).checked_mul(self.min_bandwidth);
        if !reserved.is_some_and(|reserved| reserved <= self.total_bandwidth) {
            return Err(Error::InsufficientBandwidth {
                queues: self.queues,
                min: self.min_bandwidth,
                total: self.total_bandwidth,
            });
        }
        if self.min_size > self.max_size {
            return Err(Error::InvalidSizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if i64::try_from(self.max_size).is_err() {
            return Err(Error::MessageTooLarge(self.max_size));
        }
        if !self.probability_mean.is_finite()
            || !self.probability_std.is_finite()
            || self.probability_std < 0.0
        {
            return Err(Error::InvalidProbability {
                mean: self.probability_mean,
                std: self.probability_std,
            });
        }
        Ok(())
    }
}

/// Size of the shared buffer (in bytes) for a port of the given bandwidth.
pub(crate) fn capacity(total_bandwidth: u64) -> Result<u64, Error> {
    total_bandwidth
        .checked_mul(CREDIT_UNIT)
        .filter(|capacity| i64::try_from(*capacity).is_ok())
        .ok_or(Error::BandwidthOverflow(total_bandwidth))
}
