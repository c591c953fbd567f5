//! Sliding window of request timestamps.
//!
//! Timestamps are seconds (`f64`) supplied by the caller. The buffer stays
//! sorted because the detector never records a timestamp earlier than the
//! client's last one.

use std::collections::VecDeque;

/// Length of the short window in seconds
pub const MINUTE_SECS: f64 = 60.0;
/// Length of the long window, and the retention horizon, in seconds
pub const HOUR_SECS: f64 = 3_600.0;

/// Ordered timestamps of recorded events.
///
/// An entry at `t` is inside the trailing window of length `w` at time `now`
/// when `t > now - w`; an entry exactly `w` old has already left it.
#[derive(Debug, Clone, Default)]
pub struct RequestWindow {
    stamps: VecDeque<f64>,
}

impl RequestWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry that has left the trailing `horizon` seconds.
    pub fn purge(&mut self, now: f64, horizon: f64) {
        let cutoff = now - horizon;
        while self.stamps.front().is_some_and(|&t| t <= cutoff) {
            self.stamps.pop_front();
        }
    }

    /// Append `now` to the window.
    pub fn record(&mut self, now: f64) {
        self.stamps.push_back(now);
    }

    /// Number of entries inside the trailing `window` seconds.
    pub fn count_within(&self, now: f64, window: f64) -> usize {
        let cutoff = now - window;
        self.stamps.len() - self.stamps.partition_point(|&t| t <= cutoff)
    }

    /// Whole seconds until one more entry fits under `limit` in the trailing
    /// `window`, never less than 1.
    pub fn retry_after(&self, now: f64, window: f64, limit: u32) -> u64 {
        let cutoff = now - window;
        let first = self.stamps.partition_point(|&t| t <= cutoff);
        let counted = self.stamps.len() - first;
        let limit = limit as usize;
        if counted < limit {
            return 1;
        }
        // the entry whose expiry brings the count back below the limit
        let index = first + (counted - limit);
        let wait = self.stamps.get(index).map_or(1.0, |&t| t + window - now);
        seconds_ceil(wait)
    }

    pub fn latest(&self) -> Option<f64> {
        self.stamps.back().copied()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Round a positive wait up to whole seconds, minimum 1.
pub(crate) fn seconds_ceil(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 1.0 {
        return 1;
    }
    secs.ceil() as u64
}
