//! Adaptive rate limiting and abuse detection for Warden.
//!
//! Every request is described by a client key, an endpoint class and a
//! timestamp. The detector keeps, per client:
//!
//! - **Sliding windows** of accepted request timestamps, one per endpoint
//!   class, counted over the trailing minute and the trailing hour.
//! - **An attempt log** across all classes, used for burst detection.
//! - **A reputation score** that only goes down when penalties apply
//!   (unless recovery is configured).
//! - **A block record** with an expiry, whose duration escalates with the
//!   number of prior offenses.
//!
//! # Architecture
//!
//! 1. **Classify** (`classify.rs`): ordered path rules mapping a request path
//!    to an [`EndpointClass`](crate::config::EndpointClass), plus the
//!    suspicious-path matcher.
//!
//! 2. **Window** (`window.rs`): sorted timestamp buffer with lazy purge.
//!
//! 3. **Reputation** (`reputation.rs`) and **Block** (`block.rs`): score
//!    bookkeeping and escalating backoff.
//!
//! 4. **AbuseDetector** (`limiter.rs`): sharded per-client state and the
//!    decision logic.
//!
//! 5. **Sweeper** (`sweeper.rs`): background eviction of idle clients.
//!
//! # Example Usage
//!
//! ```ignore
//! use warden_lib::config::Config;
//! use warden_lib::security::rate_limit::{AbuseDetector, Decision};
//!
//! let detector = AbuseDetector::new(Config::default())?;
//!
//! match detector.evaluate("10.0.0.1", "/auth/login", 1_700_000_000.0) {
//!     Decision::Allow { remaining, .. } => println!("allowed, {remaining} left"),
//!     Decision::RateLimited { retry_after, reason } => println!("429 ({reason}), retry in {retry_after}s"),
//!     Decision::Blocked { retry_after, reason } => println!("blocked ({reason}) for {retry_after}s"),
//! }
//! ```

mod block;
mod classify;
mod decision;
mod limiter;
mod reputation;
mod sweeper;
mod window;

pub use block::{escalated_duration, BlockRecord, OffenseHistory};
pub use classify::{classify_endpoint, EndpointClassifier};
pub use decision::{ClientStatus, Decision, DenyReason};
pub use limiter::{AbuseDetector, LimiterStats, UNKNOWN_CLIENT};
pub use reputation::Reputation;
pub use sweeper::{spawn_sweeper, unix_now};
pub use window::{RequestWindow, HOUR_SECS, MINUTE_SECS};

use ahash::RandomState;
use std::hash::Hash;

#[inline]
fn hash<T: Hash>(key: T, hasher: &RandomState) -> u64 {
    hasher.hash_one(key)
}
