use crate::config::{ClassifyRule, EndpointClass};

/// Classify `path` against an ordered rule table. First match wins,
/// unmatched paths are `General`.
pub fn classify_endpoint(rules: &[ClassifyRule], path: &str) -> EndpointClass {
    rules
        .iter()
        .find(|rule| rule.matches(path))
        .map_or(EndpointClass::General, |rule| rule.class)
}

/// Path inspection: endpoint classification and probing detection.
#[derive(Debug, Clone)]
pub struct EndpointClassifier {
    rules: Vec<ClassifyRule>,
    suspicious: Vec<String>,
}

impl EndpointClassifier {
    pub fn new(rules: Vec<ClassifyRule>, suspicious_patterns: &[String]) -> Self {
        let suspicious = suspicious_patterns
            .iter()
            .map(|p| p.to_ascii_lowercase())
            .collect();
        Self { rules, suspicious }
    }

    pub fn classify(&self, path: &str) -> EndpointClass {
        classify_endpoint(&self.rules, path)
    }

    /// First suspicious pattern contained in `path` (case-insensitive).
    pub fn suspicious_match(&self, path: &str) -> Option<&str> {
        if self.suspicious.is_empty() {
            return None;
        }
        let lowered = path.to_ascii_lowercase();
        self.suspicious
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn rules(&self) -> &[ClassifyRule] {
        &self.rules
    }
}
