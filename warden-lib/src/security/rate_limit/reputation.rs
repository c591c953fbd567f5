use crate::config::{ReputationConfig, ReputationEvent};

use super::window::HOUR_SECS;

/// Per-client trust score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reputation {
    score: f64,
    updated_at: f64,
}

impl Reputation {
    /// Neutral score for a client seen for the first time at `now`.
    pub fn new(config: &ReputationConfig, now: f64) -> Self {
        Self { score: config.initial, updated_at: now }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Apply linear recovery for the time elapsed since the last update.
    ///
    /// With `recovery_per_hour = 0` the score never moves up.
    pub fn recover(&mut self, config: &ReputationConfig, now: f64) {
        let elapsed = now - self.updated_at;
        if elapsed <= 0.0 {
            return;
        }
        if config.recovery_per_hour > 0.0 && self.score < config.initial {
            let gained = config.recovery_per_hour * elapsed / HOUR_SECS;
            self.score = (self.score + gained).min(config.initial);
        }
        self.updated_at = now;
    }

    /// Subtract the penalty for `event`, flooring at the configured minimum.
    pub fn penalize(&mut self, config: &ReputationConfig, event: ReputationEvent) -> f64 {
        let penalty = config.penalties.penalty(event);
        self.score = (self.score - penalty).max(config.minimum);
        self.score
    }

    pub fn is_below(&self, threshold: f64) -> bool {
        self.score < threshold
    }
}
