use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensitivity category of a route
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    /// AI inference endpoints (expensive per call)
    Ai,
    /// Login and token endpoints
    Authentication,
    /// Account creation endpoints
    Registration,
    /// Everything else
    General,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 4] = [
        EndpointClass::Ai,
        EndpointClass::Authentication,
        EndpointClass::Registration,
        EndpointClass::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Ai => "ai",
            EndpointClass::Authentication => "authentication",
            EndpointClass::Registration => "registration",
            EndpointClass::General => "general",
        }
    }

    /// Dense index, used to address per-class arrays
    pub(crate) fn index(&self) -> usize {
        match self {
            EndpointClass::Ai => 0,
            EndpointClass::Authentication => 1,
            EndpointClass::Registration => 2,
            EndpointClass::General => 3,
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-minute and per-hour ceilings for one endpoint class
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClassLimits {
    /// Maximum accepted requests in any trailing 60 seconds
    pub per_minute: u32,
    /// Maximum accepted requests in any trailing hour
    pub per_hour: u32,
}

impl ClassLimits {
    pub const fn new(per_minute: u32, per_hour: u32) -> Self {
        Self { per_minute, per_hour }
    }
}

/// Limit table covering every endpoint class
///
/// When the `[limits]` table is present all four classes must be given;
/// unknown class names are rejected.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    pub ai: ClassLimits,
    pub authentication: ClassLimits,
    pub registration: ClassLimits,
    pub general: ClassLimits,
}

impl LimitsConfig {
    pub fn for_class(&self, class: EndpointClass) -> ClassLimits {
        match class {
            EndpointClass::Ai => self.ai,
            EndpointClass::Authentication => self.authentication,
            EndpointClass::Registration => self.registration,
            EndpointClass::General => self.general,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ai: ClassLimits::new(30, 500),
            authentication: ClassLimits::new(10, 100),
            registration: ClassLimits::new(5, 20),
            general: ClassLimits::new(60, 1000),
        }
    }
}

/// How a classification rule pattern is compared against the request path
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Pattern may appear anywhere in the path
    #[default]
    Contains,
    /// Path must start with the pattern
    Prefix,
}

/// One entry of the ordered classification table
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClassifyRule {
    /// Path fragment to look for
    pub pattern: String,
    /// Comparison mode
    /// Default: "contains"
    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,
    /// Class assigned when the rule matches
    pub class: EndpointClass,
}

impl ClassifyRule {
    pub fn contains(pattern: &str, class: EndpointClass) -> Self {
        Self { pattern: pattern.to_string(), match_kind: MatchKind::Contains, class }
    }

    pub fn prefix(pattern: &str, class: EndpointClass) -> Self {
        Self { pattern: pattern.to_string(), match_kind: MatchKind::Prefix, class }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self.match_kind {
            MatchKind::Contains => path.contains(self.pattern.as_str()),
            MatchKind::Prefix => path.starts_with(self.pattern.as_str()),
        }
    }
}

pub fn default_rules() -> Vec<ClassifyRule> {
    vec![
        ClassifyRule::contains("/ai/", EndpointClass::Ai),
        ClassifyRule::contains("/auth/login", EndpointClass::Authentication),
        ClassifyRule::contains("/auth/register", EndpointClass::Registration),
    ]
}
