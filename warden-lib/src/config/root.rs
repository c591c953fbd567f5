use ipnet::IpNet;
use serde::Deserialize;

use super::limits::{default_rules, ClassifyRule, LimitsConfig};
use super::security::{
    default_suspicious_patterns, deserialize_ip_networks, BlockingConfig, BurstConfig,
    EvictionConfig, ReputationConfig,
};
use super::telemetry::{LoggingConfig, TelemetryConfig};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Per-class ceilings
    /// Default: ai 30/500, authentication 10/100, registration 5/20, general 60/1000
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Ordered path classification rules, first match wins
    /// Unmatched paths are classified as "general"
    #[serde(default = "default_rules")]
    pub rules: Vec<ClassifyRule>,
    /// Burst detection
    #[serde(default)]
    pub burst: BurstConfig,
    /// Reputation scoring and penalties
    #[serde(default)]
    pub reputation: ReputationConfig,
    /// Escalating block durations
    #[serde(default)]
    pub blocking: BlockingConfig,
    /// Idle client eviction
    #[serde(default)]
    pub eviction: EvictionConfig,
    /// Fraction of a ceiling at which an allowed request is flagged as warned
    /// Default: 0.8
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
    /// Number of independently locked state shards
    /// Default: 16
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Networks that are never limited
    /// Supports CIDR notation: ["127.0.0.1/32", "10.0.0.0/8", "::1/128"]
    /// Default: empty
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_ip_networks")]
    pub exempt: Vec<IpNet>,
    /// Path fragments that indicate probing; each hit costs reputation
    #[serde(default = "default_suspicious_patterns")]
    pub suspicious_patterns: Vec<String>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            rules: default_rules(),
            burst: BurstConfig::default(),
            reputation: ReputationConfig::default(),
            blocking: BlockingConfig::default(),
            eviction: EvictionConfig::default(),
            warn_ratio: default_warn_ratio(),
            shards: default_shards(),
            exempt: vec![],
            suspicious_patterns: default_suspicious_patterns(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn default_warn_ratio() -> f64 {
    0.8
}

fn default_shards() -> usize {
    16
}
