use crate::config::limits::EndpointClass;
use crate::config::root::Config;

/// Longest window a request is counted in
pub const HOUR_HORIZON_SECS: u64 = 3_600;

pub fn validate(config: &Config) -> Result<(), String> {
    for class in EndpointClass::ALL {
        let limits = config.limits.for_class(class);
        if limits.per_minute == 0 {
            return Err(format!("limits.{class}.per_minute must be > 0"));
        }
        if limits.per_hour == 0 {
            return Err(format!("limits.{class}.per_hour must be > 0"));
        }
        if limits.per_hour < limits.per_minute {
            return Err(format!("limits.{class}.per_hour must be >= per_minute"));
        }
    }

    if config.rules.iter().any(|r| r.pattern.is_empty()) {
        return Err("rule pattern cannot be empty".into());
    }
    if config.suspicious_patterns.iter().any(|p| p.is_empty()) {
        return Err("suspicious pattern cannot be empty".into());
    }

    if !config.burst.window_secs.is_finite() || config.burst.window_secs <= 0.0 {
        return Err("burst.window_secs must be a positive number".into());
    }
    if config.burst.threshold == 0 {
        return Err("burst.threshold must be > 0".into());
    }

    let rep = &config.reputation;
    for (name, value) in [
        ("reputation.initial", rep.initial),
        ("reputation.minimum", rep.minimum),
        ("reputation.block_threshold", rep.block_threshold),
        ("reputation.recovery_per_hour", rep.recovery_per_hour),
        ("reputation.penalties.rate_limit_hit", rep.penalties.rate_limit_hit),
        ("reputation.penalties.burst_detected", rep.penalties.burst_detected),
        ("reputation.penalties.suspicious_pattern", rep.penalties.suspicious_pattern),
    ] {
        if !value.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
    }
    if rep.minimum > rep.initial {
        return Err("reputation.minimum must be <= reputation.initial".into());
    }
    if rep.block_threshold < rep.minimum || rep.block_threshold > rep.initial {
        return Err("reputation.block_threshold must lie between minimum and initial".into());
    }
    if rep.recovery_per_hour < 0.0 {
        return Err("reputation.recovery_per_hour must be >= 0".into());
    }
    if rep.penalties.rate_limit_hit < 0.0
        || rep.penalties.burst_detected < 0.0
        || rep.penalties.suspicious_pattern < 0.0
    {
        return Err("reputation penalties must be >= 0".into());
    }

    let blocking = &config.blocking;
    if blocking.base_secs == 0 {
        return Err("blocking.base_secs must be > 0".into());
    }
    if !blocking.escalation_factor.is_finite() || blocking.escalation_factor < 1.0 {
        return Err("blocking.escalation_factor must be >= 1".into());
    }
    if blocking.max_secs < blocking.base_secs {
        return Err("blocking.max_secs must be >= blocking.base_secs".into());
    }

    if config.eviction.idle_ttl_secs < HOUR_HORIZON_SECS {
        return Err(format!("eviction.idle_ttl_secs must be >= {HOUR_HORIZON_SECS}"));
    }
    if config.eviction.sweep_interval_secs == 0 {
        return Err("eviction.sweep_interval_secs must be > 0".into());
    }

    if !config.warn_ratio.is_finite() || config.warn_ratio <= 0.0 || config.warn_ratio > 1.0 {
        return Err("warn_ratio must be in (0, 1]".into());
    }
    if config.shards == 0 {
        return Err("shards must be > 0".into());
    }

    Ok(())
}
