//! Synchronized clock
//!
//! Returns local wall-clock time compensated by a fixed delta so every peer
//! shares one time reference. The delta is the arithmetic mean of the samples
//! collected during the startup synchronization phase and is never reset.

use crate::util::time::unix_millis;

#[derive(Debug, Clone, Default)]
pub struct Clock {
    samples: Vec<f64>,
    delta: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a round-trip delta sample and re-average
    pub fn add_delta_sample(&mut self, sample: f64) {
        self.samples.push(sample);
        self.delta = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
    }

    /// Current averaged offset from local time, milliseconds
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Shared reference time: local time plus the averaged delta, milliseconds
    pub fn now(&self) -> f64 {
        unix_millis() + self.delta
    }
}

/// One NTP-style sample from a synchronization round trip.
///
/// The one-way delay is assumed symmetric: half the round trip. The sample is
/// the difference between the remote receipt time and the local time at which
/// the remote should have received the ping.
pub fn delta_sample(tx_time: f64, server_time: f64, rx_time: f64) -> f64 {
    let delay = (rx_time - tx_time) / 2.0;
    server_time - (tx_time + delay)
}
