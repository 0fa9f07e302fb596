//! Arbitrate a shared egress port between queues with credit-based round robin.
//!
//! Each [Queue] accrues credit every cycle in proportion to its bandwidth share and may
//! only send while that credit is positive. A shared buffer, sized from the port's total
//! bandwidth, caps how many bytes all queues combined can send in a single cycle.
//!
//! # Cycle
//!
//! Every call to [Arbiter::cycle] runs, in order:
//!
//! 1. `receive_time` arrival trials for every queue, followed by a credit replenishment.
//! 2. One drain pass: starting at the rotation cursor, each queue is serviced until it runs
//!    out of credit or backlog, then the cursor advances. If the shared buffer cannot fit
//!    the next message, the pass stops and the cursor stays put, so the queue that missed
//!    out is serviced first in the next cycle.
//! 3. Per-queue and per-port records are appended (see [record]).
//!
//! # Determinism
//!
//! All randomness (bandwidth distribution, arrival probabilities, and arrivals) is drawn
//! from the generator supplied at construction. Seeding it makes a run reproducible, which
//! can be checked with [Auditor::state].
//!
//! # Example
//!
//! ```rust
//! use egress_arbiter::{Arbiter, Config};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut arbiter = Arbiter::new(StdRng::seed_from_u64(0), Config::default()).unwrap();
//! for _ in 0..100 {
//!     arbiter.cycle();
//! }
//! assert_eq!(arbiter.port().len(), 100);
//! assert!(arbiter.port().sent.iter().all(|sent| *sent <= arbiter.capacity()));
//! ```

use prometheus_client::registry::Registry;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace};

pub mod arrival;
pub use arrival::{Arrival, Bernoulli};
mod auditor;
pub use auditor::Auditor;
mod config;
pub use config::Config;
mod metrics;
pub mod queue;
pub use queue::{Queue, Status};
pub mod record;
pub use record::{PortRecord, QueueRecord};

/// Bytes of credit (and shared buffer) per unit of bandwidth.
pub const CREDIT_UNIT: u64 = 64;

/// Errors that can occur when constructing an [Arbiter].
#[derive(Debug, Error)]
pub enum Error {
    #[error("at least one queue is required")]
    NoQueues,
    #[error("total bandwidth must be positive")]
    ZeroBandwidth,
    #[error("minimum bandwidth must be positive")]
    ZeroMinBandwidth,
    #[error("bandwidth increase must be positive")]
    ZeroIncrease,
    #[error("receive time must be positive")]
    ZeroReceiveTime,
    #[error("total bandwidth overflows buffer capacity: {0}")]
    BandwidthOverflow(u64),
    #[error("insufficient bandwidth: {queues} queues * {min} > {total}")]
    InsufficientBandwidth { queues: usize, min: u64, total: u64 },
    #[error("invalid size range: min={min} max={max}")]
    InvalidSizeRange { min: u64, max: u64 },
    #[error("message size exceeds credit range: {0}")]
    MessageTooLarge(u64),
    #[error("invalid probability distribution: mean={mean} std={std}")]
    InvalidProbability { mean: f64, std: f64 },
}

/// Outcome of a single drain pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pass {
    /// Queues in the order they were visited.
    pub visited: Vec<usize>,
    /// Bytes sent by each queue that sent at least one message.
    pub sent: BTreeMap<usize, u64>,
    /// Bytes sent across all queues.
    pub total: u64,
    /// Whether the pass stopped because the shared buffer could not fit the next message.
    pub finished_early: bool,
}

/// Credit-based round-robin scheduler for a single shared port.
pub struct Arbiter<R, A: Arrival = Bernoulli> {
    rng: R,
    queues: Vec<Queue<A>>,
    receive_time: usize,
    capacity: u64,

    cursor: usize,
    cycles: u64,
    pass: Pass,

    records: Vec<QueueRecord>,
    port: PortRecord,
    auditor: Auditor,
    metrics: metrics::Metrics,
}

impl<R: Rng> Arbiter<R, Bernoulli> {
    /// Distribute bandwidth and arrival probabilities to `cfg.queues` queues.
    pub fn new(mut rng: R, cfg: Config) -> Result<Self, Error> {
        cfg.validate()?;

        // Guarantee every queue its minimum share
        let mut bandwidths = vec![cfg.min_bandwidth; cfg.queues];
        let mut remaining = cfg.total_bandwidth - cfg.min_bandwidth * cfg.queues as u64;

        // Draw arrival probabilities
        let normal = Normal::new(cfg.probability_mean, cfg.probability_std).map_err(|_| {
            Error::InvalidProbability {
                mean: cfg.probability_mean,
                std: cfg.probability_std,
            }
        })?;
        let probabilities: Vec<f64> = (0..cfg.queues)
            .map(|_| normal.sample(&mut rng).clamp(0.0, 1.0))
            .collect();

        // Hand out the rest one increment at a time
        while remaining >= cfg.increase_bandwidth {
            let index = rng.gen_range(0..cfg.queues);
            bandwidths[index] += cfg.increase_bandwidth;
            remaining -= cfg.increase_bandwidth;
        }
        if remaining > 0 {
            debug!(remaining, "discarded bandwidth below increment");
        }

        let queues = bandwidths
            .into_iter()
            .zip(probabilities)
            .enumerate()
            .map(|(index, (bandwidth, probability))| {
                debug!(queue = index, bandwidth, probability, "initialized queue");
                Queue::new(
                    bandwidth,
                    Bernoulli::new(probability, cfg.min_size, cfg.max_size),
                )
            })
            .collect();
        Self::with_queues(rng, cfg.total_bandwidth, cfg.receive_time, queues)
    }

    /// Arrival probability of each queue.
    pub fn probabilities(&self) -> Vec<f64> {
        self.queues
            .iter()
            .map(|queue| queue.arrival().probability())
            .collect()
    }
}

impl<R: Rng, A: Arrival> Arbiter<R, A> {
    /// Arbitrate between caller-supplied queues.
    ///
    /// The shared buffer is sized from `total_bandwidth` alone, regardless of the
    /// bandwidth assigned to each queue.
    pub fn with_queues(
        rng: R,
        total_bandwidth: u64,
        receive_time: usize,
        queues: Vec<Queue<A>>,
    ) -> Result<Self, Error> {
        if queues.is_empty() {
            return Err(Error::NoQueues);
        }
        if total_bandwidth == 0 {
            return Err(Error::ZeroBandwidth);
        }
        if receive_time == 0 {
            return Err(Error::ZeroReceiveTime);
        }
        let capacity = config::capacity(total_bandwidth)?;
        let records = vec![QueueRecord::default(); queues.len()];
        Ok(Self {
            rng,
            queues,
            receive_time,
            capacity,
            cursor: 0,
            cycles: 0,
            pass: Pass::default(),
            records,
            port: PortRecord::default(),
            auditor: Auditor::default(),
            metrics: metrics::Metrics::default(),
        })
    }

    /// Register the arbiter's metrics.
    pub fn register(&self, registry: &mut Registry) {
        self.metrics.register(registry);
    }

    /// Advance the simulation by one cycle.
    pub fn cycle(&mut self) {
        self.cycles += 1;

        // Credit must reflect this cycle's arrivals before any send decision
        for queue in &mut self.queues {
            for _ in 0..self.receive_time {
                queue.receive(&mut self.rng);
            }
            queue.replenish();
        }

        let pass = self.drain();

        // Record the outcome
        let mut remaining = 0;
        let mut observed = Vec::with_capacity(self.queues.len());
        let records = self.queues.iter().zip(&mut self.records);
        for (index, (queue, record)) in records.enumerate() {
            let status = queue.status();
            let sent = pass.sent.get(&index).copied().unwrap_or_default();
            record.push(sent, status);
            remaining = status.size.saturating_add(remaining);
            if sent > 0 {
                self.metrics
                    .queue_bytes_sent
                    .get_or_create(&metrics::Queue::new(index))
                    .inc_by(sent);
            }
            observed.push((sent, status));
        }
        self.port.push(pass.total, remaining);
        self.auditor.cycle(self.cycles, &observed, pass.total, remaining);

        self.metrics.cycles.inc();
        self.metrics.bytes_sent.inc_by(pass.total);
        self.metrics
            .backlog_bytes
            .set(i64::try_from(remaining).unwrap_or(i64::MAX));
        if pass.finished_early {
            self.metrics.early_finishes.inc();
        }
        self.pass = pass;
    }

    /// Service queues in round-robin order until every queue is exhausted or the shared
    /// buffer cannot fit the next message.
    fn drain(&mut self) -> Pass {
        let count = self.queues.len();
        let mut buffer = self.capacity;
        let mut pass = Pass::default();
        for _ in 0..count {
            assert!(self.cursor < count, "cursor out of range");
            let index = self.cursor;
            pass.visited.push(index);

            // Send until the queue runs dry (or the buffer fills)
            let queue = &mut self.queues[index];
            while let Some(size) = queue.peek() {
                if buffer < size {
                    pass.finished_early = true;
                    break;
                }
                let size = queue.send();
                buffer -= size;
                *pass.sent.entry(index).or_default() += size;
                trace!(queue = index, size, buffer, "sent message");
            }

            // The queue that could not fit keeps priority for the next cycle
            if pass.finished_early {
                debug!(
                    queue = index,
                    buffer,
                    cycle = self.cycles,
                    "shared buffer exhausted"
                );
                break;
            }
            self.cursor = (index + 1) % count;
        }
        pass.total = self.capacity - buffer;
        debug_assert_eq!(pass.total, pass.sent.values().sum::<u64>());
        pass
    }

    /// Queue that will be serviced first in the next drain pass.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes all queues combined may send in a single cycle.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of cycles executed.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Number of arrival trials each queue runs per cycle.
    pub fn receive_time(&self) -> usize {
        self.receive_time
    }

    /// Queues in service order.
    pub fn queues(&self) -> &[Queue<A>] {
        &self.queues
    }

    /// Bandwidth share of each queue.
    pub fn bandwidths(&self) -> Vec<u64> {
        self.queues.iter().map(Queue::bandwidth).collect()
    }

    /// Outcome of the most recent drain pass.
    pub fn last_pass(&self) -> &Pass {
        &self.pass
    }

    /// Per-cycle history of each queue.
    pub fn records(&self) -> &[QueueRecord] {
        &self.records
    }

    /// Per-cycle history of the port.
    pub fn port(&self) -> &PortRecord {
        &self.port
    }

    /// Fingerprint of every record produced so far.
    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }
}
