mod limits;
mod loader;
mod root;
mod security;
mod telemetry;
mod validator;

pub use limits::{default_rules, ClassLimits, ClassifyRule, EndpointClass, LimitsConfig, MatchKind};
pub use loader::{load_from_path, load_from_str};
pub use root::Config;
pub use security::{
    default_suspicious_patterns, BlockingConfig, BurstConfig, EvictionConfig, PenaltyTable,
    ReputationConfig, ReputationEvent,
};
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use validator::{validate, HOUR_HORIZON_SECS};
