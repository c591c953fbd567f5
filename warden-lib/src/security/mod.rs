pub mod ip_filter;
pub mod rate_limit;

pub use ip_filter::{is_exempt, parse_client_ip};
pub use rate_limit::{AbuseDetector, ClientStatus, Decision, DenyReason, LimiterStats};
