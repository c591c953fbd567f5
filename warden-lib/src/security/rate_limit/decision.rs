//! Result types handed back to the HTTP layer.

use serde::Serialize;
use std::fmt;

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The per-minute ceiling of the endpoint class was reached
    MinuteLimitExceeded,
    /// The per-hour ceiling of the endpoint class was reached
    HourLimitExceeded,
    /// A ceiling was reached while the client was bursting
    BurstDetected,
    /// A ceiling was reached with a reputation under the block threshold
    LowReputation,
    /// Probing paths drove the reputation under the block threshold
    SuspiciousPattern,
}

impl DenyReason {
    /// Stable machine-readable code
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MinuteLimitExceeded => "minute_limit_exceeded",
            DenyReason::HourLimitExceeded => "hour_limit_exceeded",
            DenyReason::BurstDetected => "burst_detected",
            DenyReason::LowReputation => "low_reputation",
            DenyReason::SuspiciousPattern => "suspicious_pattern",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::MinuteLimitExceeded => "too many requests in the last minute",
            DenyReason::HourLimitExceeded => "too many requests in the last hour",
            DenyReason::BurstDetected => "request burst detected",
            DenyReason::LowReputation => "client reputation too low",
            DenyReason::SuspiciousPattern => "suspicious request pattern",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// Request is allowed to proceed.
    Allow {
        /// Requests left before the tighter of the two ceilings is reached
        remaining: u32,
        /// Usage crossed the warning ratio of a ceiling
        warned: bool,
        /// The client is bursting (reported only, not enforced here)
        burst: bool,
    },
    /// A ceiling was exceeded; the client may retry later.
    RateLimited {
        /// Seconds until a retry can succeed (>= 1)
        retry_after: u64,
        reason: DenyReason,
    },
    /// The client is blocked until the block expires.
    Blocked {
        /// Seconds until the block expires (>= 1)
        retry_after: u64,
        reason: DenyReason,
    },
}

impl Decision {
    pub(crate) fn exempt() -> Self {
        Decision::Allow { remaining: u32::MAX, warned: false, burst: false }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::RateLimited { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked { .. })
    }

    /// Seconds the caller should wait, for rejected requests.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Decision::Allow { .. } => None,
            Decision::RateLimited { retry_after, .. } | Decision::Blocked { retry_after, .. } => {
                Some(*retry_after)
            }
        }
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow { .. } => None,
            Decision::RateLimited { reason, .. } | Decision::Blocked { reason, .. } => {
                Some(*reason)
            }
        }
    }

    /// Short label used for metrics and logs
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Allow { .. } => "allow",
            Decision::RateLimited { .. } => "rate_limited",
            Decision::Blocked { .. } => "blocked",
        }
    }
}

/// Position of a client in the per-class state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Normal,
    /// Usage reached the warning ratio of a ceiling
    Warned,
    /// A ceiling is reached; further requests are rejected
    Limited,
    /// A block is active
    Blocked,
}
