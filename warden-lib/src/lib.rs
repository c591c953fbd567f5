#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod replay;
pub mod security;
pub mod telemetry;

pub use config::{load_from_path, Config, EndpointClass, ReputationEvent};
pub use error::{Result, WardenError};
pub use security::rate_limit::{spawn_sweeper, unix_now};
pub use security::{AbuseDetector, ClientStatus, Decision, DenyReason, LimiterStats};
