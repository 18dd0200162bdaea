//! Fault injection for exercising the reliability machinery.
//!
//! [`LossyTransport`] wraps any [`Transport`] and applies a configurable
//! fault model to outbound datagrams:
//!
//! | Fault        | Description                                         |
//! |--------------|-----------------------------------------------------|
//! | Loss         | Drop a datagram with probability `loss_rate`.       |
//! | Duplication  | Deliver a datagram twice.                           |
//! | Reordering   | Hold a datagram back until after the next send.     |
//!
//! Corruption is never simulated: the protocol assumes an uncorrupting
//! channel. The RNG is seeded so failing runs can be replayed.

use std::collections::VecDeque;
use std::io;
use std::time::Instant;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::transport::Transport;

/// Probabilities of each fault, all in `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub loss_rate: f64,
    pub duplicate_rate: f64,
    pub reorder_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

/// Counts of faults injected so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub sent: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

type DropFilter = Box<dyn FnMut(&[u8]) -> bool + Send>;

/// A fault-injecting wrapper around another transport.
pub struct LossyTransport<T> {
    inner: T,
    config: SimulatorConfig,
    rng: StdRng,
    held: VecDeque<Bytes>,
    filter: Option<DropFilter>,
    stats: SimulatorStats,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let config = SimulatorConfig {
            loss_rate: config.loss_rate.clamp(0.0, 1.0),
            duplicate_rate: config.duplicate_rate.clamp(0.0, 1.0),
            reorder_rate: config.reorder_rate.clamp(0.0, 1.0),
            seed: config.seed,
        };
        Self {
            inner,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            held: VecDeque::new(),
            filter: None,
            stats: SimulatorStats::default(),
        }
    }

    /// Drop every outbound datagram for which `filter` returns true, in
    /// addition to the random faults.
    pub fn drop_when(mut self, filter: impl FnMut(&[u8]) -> bool + Send + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    fn release_held(&mut self) -> io::Result<()> {
        while let Some(datagram) = self.held.pop_front() {
            self.inner.send(&datagram)?;
        }
        Ok(())
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.stats.sent += 1;

        if let Some(filter) = self.filter.as_mut() {
            if filter(datagram) {
                self.stats.dropped += 1;
                return Ok(());
            }
        }
        if self.rng.random_bool(self.config.loss_rate) {
            self.stats.dropped += 1;
            return Ok(());
        }
        if self.rng.random_bool(self.config.reorder_rate) {
            self.stats.reordered += 1;
            self.held.push_back(Bytes::copy_from_slice(datagram));
            return Ok(());
        }

        self.inner.send(datagram)?;
        if self.rng.random_bool(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            self.inner.send(datagram)?;
        }
        // Anything held back now arrives after a newer datagram.
        self.release_held()
    }

    fn try_receive(&mut self, deadline: Instant) -> io::Result<Option<Bytes>> {
        self.release_held()?;
        self.inner.try_receive(deadline)
    }
}
