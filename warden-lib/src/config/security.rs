use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Burst detection configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BurstConfig {
    /// Length of the burst sub-window in seconds
    /// Default: 2.0
    #[serde(default = "default_burst_window")]
    pub window_secs: f64,
    /// A burst is flagged when more than this many attempts fall in the sub-window
    /// Default: 5
    #[serde(default = "default_burst_threshold")]
    pub threshold: u32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self { window_secs: default_burst_window(), threshold: default_burst_threshold() }
    }
}

fn default_burst_window() -> f64 {
    2.0
}

fn default_burst_threshold() -> u32 {
    5
}

/// Events that lower a client's reputation
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReputationEvent {
    /// A per-minute or per-hour ceiling was exceeded
    RateLimitHit,
    /// Too many attempts inside the burst sub-window
    BurstDetected,
    /// The request path matched a known probing pattern
    SuspiciousPattern,
}

impl ReputationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationEvent::RateLimitHit => "rate_limit_hit",
            ReputationEvent::BurstDetected => "burst_detected",
            ReputationEvent::SuspiciousPattern => "suspicious_pattern",
        }
    }
}

impl fmt::Display for ReputationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Penalty subtracted from the score for each event kind
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PenaltyTable {
    #[serde(default = "default_rate_limit_penalty")]
    pub rate_limit_hit: f64,
    #[serde(default = "default_burst_penalty")]
    pub burst_detected: f64,
    #[serde(default = "default_suspicious_penalty")]
    pub suspicious_pattern: f64,
}

impl PenaltyTable {
    pub fn penalty(&self, event: ReputationEvent) -> f64 {
        match event {
            ReputationEvent::RateLimitHit => self.rate_limit_hit,
            ReputationEvent::BurstDetected => self.burst_detected,
            ReputationEvent::SuspiciousPattern => self.suspicious_pattern,
        }
    }
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            rate_limit_hit: default_rate_limit_penalty(),
            burst_detected: default_burst_penalty(),
            suspicious_pattern: default_suspicious_penalty(),
        }
    }
}

fn default_rate_limit_penalty() -> f64 {
    10.0
}

fn default_burst_penalty() -> f64 {
    20.0
}

fn default_suspicious_penalty() -> f64 {
    25.0
}

/// Reputation scoring configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReputationConfig {
    /// Score given to a client on first sight
    /// Default: 100.0
    #[serde(default = "default_initial_score")]
    pub initial: f64,
    /// Floor the score never drops below
    /// Default: 0.0
    #[serde(default)]
    pub minimum: f64,
    /// A ceiling violation blocks the client once its score is below this value
    /// Default: 50.0
    #[serde(default = "default_block_threshold")]
    pub block_threshold: f64,
    /// Points regained per hour without penalties, capped at `initial`
    /// Default: 0.0 (no recovery; idle eviction is the only reset)
    #[serde(default)]
    pub recovery_per_hour: f64,
    /// Penalty per event kind
    #[serde(default)]
    pub penalties: PenaltyTable,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_score(),
            minimum: 0.0,
            block_threshold: default_block_threshold(),
            recovery_per_hour: 0.0,
            penalties: PenaltyTable::default(),
        }
    }
}

fn default_initial_score() -> f64 {
    100.0
}

fn default_block_threshold() -> f64 {
    50.0
}

/// Block duration policy
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BlockingConfig {
    /// Duration of a first offense in seconds
    /// Default: 60
    #[serde(default = "default_base_secs")]
    pub base_secs: u64,
    /// Multiplier applied once per prior offense
    /// Default: 2.0
    #[serde(default = "default_escalation_factor")]
    pub escalation_factor: f64,
    /// Upper bound for any block in seconds
    /// Default: 86400 (24 hours)
    #[serde(default = "default_max_secs")]
    pub max_secs: u64,
    /// Rolling window in which prior blocks count as offenses
    /// Default: 86400 (24 hours)
    #[serde(default = "default_offense_window")]
    pub offense_window_secs: u64,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            base_secs: default_base_secs(),
            escalation_factor: default_escalation_factor(),
            max_secs: default_max_secs(),
            offense_window_secs: default_offense_window(),
        }
    }
}

fn default_base_secs() -> u64 {
    60
}

fn default_escalation_factor() -> f64 {
    2.0
}

fn default_max_secs() -> u64 {
    86_400
}

fn default_offense_window() -> u64 {
    86_400
}

/// Idle client eviction
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EvictionConfig {
    /// Clients idle for longer than this (and not blocked) are forgotten
    /// Must be at least one hour so no counted request is lost
    /// Default: 7200
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
    /// How often the background sweeper runs
    /// Default: 300
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_idle_ttl() -> u64 {
    7_200
}

fn default_sweep_interval() -> u64 {
    300
}

pub fn default_suspicious_patterns() -> Vec<String> {
    ["/.env", "/.git", "/wp-admin", "/wp-login", "../", "/phpmyadmin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Custom deserializer for IP networks that handles parsing errors gracefully
pub(crate) fn deserialize_ip_networks<'de, D>(deserializer: D) -> Result<Vec<IpNet>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let strings: Vec<String> = Vec::deserialize(deserializer)?;
    let mut networks = Vec::new();

    for s in strings {
        match s.parse::<IpNet>() {
            Ok(net) => networks.push(net),
            Err(e) => {
                return Err(serde::de::Error::custom(format!("Invalid IP network '{}': {}", s, e)));
            }
        }
    }

    Ok(networks)
}
