//! A traffic class competing for the shared port.
//!
//! Each [Queue] holds a FIFO backlog of message sizes and a signed credit balance. Credit
//! is granted once per cycle ([Queue::replenish]) and spent on every send ([Queue::send]).
//! A queue may only send while its credit is positive, so the final message of a burst
//! can overdraw the balance; the deficit is repaid by later replenishments.

use crate::{arrival::Arrival, CREDIT_UNIT};
use rand::Rng;
use std::collections::VecDeque;

/// Snapshot of a queue's backlog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Number of pending messages.
    pub count: usize,
    /// Sum of the sizes of all pending messages.
    pub size: u64,
}

/// A credit-gated FIFO of pending messages.
#[derive(Clone, Debug)]
pub struct Queue<A: Arrival> {
    bandwidth: u64,
    credit_default: i64,
    credit: i64,
    backlog: VecDeque<u64>,
    arrival: A,
}

impl<A: Arrival> Queue<A> {
    /// Create an empty queue with no credit.
    ///
    /// Every replenishment grants `bandwidth * CREDIT_UNIT` credit.
    pub fn new(bandwidth: u64, arrival: A) -> Self {
        let credit_default = bandwidth
            .checked_mul(CREDIT_UNIT)
            .and_then(|credit| i64::try_from(credit).ok())
            .expect("bandwidth overflows credit");
        Self {
            bandwidth,
            credit_default,
            credit: 0,
            backlog: VecDeque::new(),
            arrival,
        }
    }

    /// Run one arrival trial, appending the new message (if any) to the tail of the backlog.
    pub fn receive<R: Rng>(&mut self, rng: &mut R) {
        if let Some(size) = self.arrival.generate(rng) {
            self.backlog.push_back(size);
        }
    }

    /// Grant one cycle of credit.
    ///
    /// An idle queue never holds more than a single allotment. A backlogged queue keeps
    /// whatever it could not spend (for example, because the shared buffer was full) so
    /// that it can catch up. Credit saturates at `i64::MAX`.
    pub fn replenish(&mut self) {
        self.credit = self.credit.saturating_add(self.credit_default);
        if self.backlog.is_empty() {
            self.credit = self.credit.min(self.credit_default);
        }
    }

    /// Size of the head message, if the queue has positive credit to send it.
    pub fn peek(&self) -> Option<u64> {
        if self.credit <= 0 {
            return None;
        }
        self.backlog.front().copied()
    }

    /// Remove the head message, charging its size against the credit balance.
    ///
    /// # Panics
    ///
    /// Panics if [Queue::peek] would return `None`.
    pub fn send(&mut self) -> u64 {
        assert!(self.credit > 0, "send without credit");
        let size = self.backlog.pop_front().expect("send from empty backlog");
        self.credit = self.credit.saturating_sub_unsigned(size);
        size
    }

    /// Count and total size (saturating at `u64::MAX`) of the backlog.
    pub fn status(&self) -> Status {
        Status {
            count: self.backlog.len(),
            size: self
                .backlog
                .iter()
                .fold(0u64, |total, size| total.saturating_add(*size)),
        }
    }

    /// Bandwidth share granted at construction.
    pub fn bandwidth(&self) -> u64 {
        self.bandwidth
    }

    /// Current credit balance (may be zero or negative).
    pub fn credit(&self) -> i64 {
        self.credit
    }

    /// Credit granted by each replenishment.
    pub fn credit_default(&self) -> i64 {
        self.credit_default
    }

    /// Number of pending messages.
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    /// Whether there are no pending messages.
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Arrival policy feeding this queue.
    pub fn arrival(&self) -> &A {
        &self.arrival
    }
}
