use std::collections::VecDeque;
use std::time::Duration;

use crate::config::BlockingConfig;

use super::decision::DenyReason;

/// Hard block on a client until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRecord {
    pub expires_at: f64,
    pub reason: DenyReason,
}

impl BlockRecord {
    pub fn is_active(&self, now: f64) -> bool {
        now < self.expires_at
    }

    pub fn remaining(&self, now: f64) -> f64 {
        (self.expires_at - now).max(0.0)
    }
}

/// Timestamps of the blocks a client received inside the offense window.
#[derive(Debug, Clone, Default)]
pub struct OffenseHistory {
    stamps: VecDeque<f64>,
}

impl OffenseHistory {
    pub fn purge(&mut self, now: f64, window_secs: u64) {
        let cutoff = now - window_secs as f64;
        while self.stamps.front().is_some_and(|&t| t <= cutoff) {
            self.stamps.pop_front();
        }
    }

    pub fn record(&mut self, now: f64) {
        self.stamps.push_back(now);
    }

    pub fn count(&self) -> usize {
        self.stamps.len()
    }

    /// Offenses inside the trailing window, without purging.
    pub fn count_within(&self, now: f64, window_secs: u64) -> usize {
        let cutoff = now - window_secs as f64;
        self.stamps.len() - self.stamps.partition_point(|&t| t <= cutoff)
    }
}

/// `base * factor^prior_offenses`, capped at `max_secs`.
pub fn escalated_duration(config: &BlockingConfig, prior_offenses: usize) -> Duration {
    let exponent = i32::try_from(prior_offenses).unwrap_or(i32::MAX);
    let secs = config.base_secs as f64 * config.escalation_factor.powi(exponent);
    let capped = secs.min(config.max_secs as f64);
    Duration::try_from_secs_f64(capped).unwrap_or(Duration::from_secs(config.max_secs))
}
