//! Drive an [Arbiter] and summarize the records it produces.

use egress_arbiter::{Arbiter, Arrival, Bernoulli, Config, PortRecord, QueueRecord, CREDIT_UNIT};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::{fs::File, path::Path};
use thiserror::Error;
use tracing::info;

/// Errors that can occur when preparing a simulation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Arbiter(#[from] egress_arbiter::Error),
}

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Load an arbiter configuration from a YAML file (missing fields take their defaults).
pub fn load(path: &Path) -> Result<Config, Error> {
    let file = File::open(path)?;
    let cfg: Config = serde_yaml::from_reader(file)?;
    Ok(cfg)
}

/// Build an arbiter from `cfg` seeded with `seed` and run it for `cycles` cycles.
pub fn simulate(cfg: Config, seed: u64, cycles: u64) -> Result<Arbiter<StdRng>, Error> {
    let mut arbiter = Arbiter::new(StdRng::seed_from_u64(seed), cfg)?;
    for _ in 0..cycles {
        arbiter.cycle();
    }
    info!(
        seed,
        cycles,
        digest = arbiter.auditor().state(),
        "simulation complete"
    );
    Ok(arbiter)
}

/// Fraction of the shared buffer used in each cycle.
pub fn port_usage<R, A: Arrival>(arbiter: &Arbiter<R, A>) -> Vec<f64>
where
    R: rand::Rng,
{
    let capacity = arbiter.capacity() as f64;
    arbiter
        .port()
        .sent
        .iter()
        .map(|sent| *sent as f64 / capacity)
        .collect()
}

/// Bytes sent by each queue relative to the credit it was granted over the run.
pub fn queue_usage<R, A: Arrival>(arbiter: &Arbiter<R, A>) -> Vec<f64>
where
    R: rand::Rng,
{
    let cycles = arbiter.cycles();
    arbiter
        .queues()
        .iter()
        .zip(arbiter.records())
        .map(|(queue, record)| {
            let granted = queue.bandwidth() * CREDIT_UNIT * cycles;
            if granted == 0 {
                return 0.0;
            }
            record.total as f64 / granted as f64
        })
        .collect()
}

/// Count `values` in `[0, 1]` into `bins` equal-width buckets (1.0 falls in the last bucket).
pub fn histogram(values: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }
    for value in values {
        let index = ((value.clamp(0.0, 1.0) * bins as f64) as usize).min(bins - 1);
        counts[index] += 1;
    }
    counts
}

/// Compute the mean of a set of values.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute the median of a set of values (sorting them in place).
pub fn median(data: &mut [f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.sort_by(|a, b| a.total_cmp(b));
    let mid = data.len() / 2;
    if data.len() % 2 == 0 {
        (data[mid - 1] + data[mid]) / 2.0
    } else {
        data[mid]
    }
}

/// Compute the population standard deviation of a set of values.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let avg = mean(data);
    let variance = data
        .iter()
        .map(|value| {
            let diff = avg - value;
            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;
    Some(variance.sqrt())
}

/// Summary statistics of a series.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    pub fn new(data: &[f64]) -> Self {
        let mut sorted = data.to_vec();
        Self {
            mean: mean(data),
            median: median(&mut sorted),
            std_dev: std_dev(data).unwrap_or(0.0),
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
        }
    }
}

/// Everything an external reporter needs to render a run.
#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub seed: u64,
    pub cycles: u64,
    pub config: Config,
    pub capacity: u64,
    pub digest: String,
    pub bandwidths: Vec<u64>,
    pub probabilities: Vec<f64>,
    pub port_usage: Stats,
    pub queue_usage: Vec<f64>,
    pub port: PortRecord,
    pub queues: Vec<QueueRecord>,
}

impl Summary {
    pub fn new(seed: u64, config: Config, arbiter: &Arbiter<StdRng, Bernoulli>) -> Self {
        Self {
            seed,
            cycles: arbiter.cycles(),
            config,
            capacity: arbiter.capacity(),
            digest: arbiter.auditor().state(),
            bandwidths: arbiter.bandwidths(),
            probabilities: arbiter.probabilities(),
            port_usage: Stats::new(&port_usage(arbiter)),
            queue_usage: queue_usage(arbiter),
            port: arbiter.port().clone(),
            queues: arbiter.records().to_vec(),
        }
    }
}
