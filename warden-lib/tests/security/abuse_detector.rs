use warden_lib::config::{ClassLimits, Config, EndpointClass, ReputationEvent};
use warden_lib::security::rate_limit::UNKNOWN_CLIENT;
use warden_lib::{AbuseDetector, ClientStatus, Decision, DenyReason};

use super::{default_detector, TestResult, T0};

#[test]
fn test_burst_flagged_but_allowed_under_ceiling() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.0.1";

    let decisions: Vec<Decision> = (0..6)
        .map(|i| detector.check_request(key, EndpointClass::Authentication, T0 + i as f64 * 0.1))
        .collect();

    for (i, decision) in decisions.iter().enumerate() {
        assert!(decision.is_allowed(), "request {i} should be allowed, got {decision:?}");
    }
    assert_eq!(
        decisions[4],
        Decision::Allow { remaining: 5, warned: false, burst: false }
    );
    assert_eq!(
        decisions[5],
        Decision::Allow { remaining: 4, warned: false, burst: true }
    );
    assert!(detector.detect_burst(key, T0 + 0.5));
    // nothing was penalized
    assert_eq!(detector.reputation(key, T0), Some(100.0));
    Ok(())
}

#[test]
fn test_eleventh_authentication_request_is_rate_limited() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.0.2";

    for i in 0..10 {
        let decision = detector.check_request(key, EndpointClass::Authentication, T0 + 5.0 * i as f64);
        assert!(decision.is_allowed(), "request {i} should be allowed, got {decision:?}");
    }

    let decision = detector.check_request(key, EndpointClass::Authentication, T0 + 50.0);
    assert_eq!(
        decision,
        Decision::RateLimited { retry_after: 10, reason: DenyReason::MinuteLimitExceeded }
    );
    assert_eq!(detector.reputation(key, T0), Some(90.0));
    assert_eq!(detector.status(key, EndpointClass::Authentication, T0 + 50.0), ClientStatus::Limited);

    // once the oldest request leaves the minute window there is room again
    let decision = detector.check_request(key, EndpointClass::Authentication, T0 + 60.0);
    assert!(decision.is_allowed(), "got {decision:?}");
    Ok(())
}

#[test]
fn test_reputation_drop_blocks_with_escalating_duration() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.0.3";
    let class = EndpointClass::Authentication;

    for i in 0..10 {
        assert!(detector.check_request(key, class, T0 + 3.0 * i as f64).is_allowed());
    }

    // five violations: 100 -> 50, still at the threshold
    for (n, t) in [30.0, 33.0, 36.0, 39.0, 42.0].into_iter().enumerate() {
        let decision = detector.check_request(key, class, T0 + t);
        assert!(decision.is_limited(), "violation {n} should be rate limited, got {decision:?}");
    }
    assert_eq!(detector.reputation(key, T0), Some(50.0));
    assert_eq!(detector.compute_block_duration(key, T0 + 45.0).as_secs(), 60);

    // sixth violation: 40 < 50
    let decision = detector.check_request(key, class, T0 + 45.0);
    assert_eq!(
        decision,
        Decision::Blocked { retry_after: 60, reason: DenyReason::LowReputation }
    );
    assert_eq!(detector.block_expiry(key, T0 + 45.0), Some(T0 + 105.0));

    let decision = detector.check_request(key, class, T0 + 45.0);
    assert_eq!(decision.retry_after(), Some(60));
    assert!(decision.is_blocked());

    // the next block would be twice as long
    assert_eq!(detector.compute_block_duration(key, T0 + 46.0).as_secs(), 120);
    Ok(())
}

#[test]
fn test_block_countdown_then_fresh_evaluation() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.0.4";
    let class = EndpointClass::Authentication;

    for _ in 0..6 {
        detector.update_reputation(key, ReputationEvent::RateLimitHit, T0);
    }
    for i in 0..10 {
        assert!(detector.check_request(key, class, T0 + 3.0 * i as f64).is_allowed());
    }
    let decision = detector.check_request(key, class, T0 + 30.0);
    assert_eq!(decision.reason(), Some(DenyReason::LowReputation));
    let expiry = T0 + 90.0;

    let mut previous = u64::MAX;
    let mut t = T0 + 30.0;
    while t < expiry {
        let decision = detector.check_request(key, class, t);
        assert!(decision.is_blocked(), "at {t} expected blocked, got {decision:?}");
        let retry = decision.retry_after().unwrap_or(0);
        assert!(retry >= 1);
        assert!(retry <= previous, "retry_after grew from {previous} to {retry}");
        previous = retry;
        t += 0.75;
    }

    // at expiry the request is evaluated against windows, not auto-blocked
    let decision = detector.check_request(key, class, expiry);
    assert!(decision.is_allowed(), "got {decision:?}");
    assert_eq!(detector.block_expiry(key, expiry), None);
    Ok(())
}

#[test]
fn test_clients_are_isolated() -> TestResult {
    let detector = default_detector()?;
    let class = EndpointClass::Registration;

    for i in 0..6 {
        detector.check_request("10.0.0.5", class, T0 + 0.1 * i as f64);
    }
    assert!(detector.block_expiry("10.0.0.5", T0 + 1.0).is_some());
    assert!(detector.reputation("10.0.0.5", T0).unwrap_or(100.0) < 100.0);

    assert_eq!(detector.reputation("10.0.0.6", T0), None);
    for i in 0..5 {
        let decision = detector.check_request("10.0.0.6", class, T0 + 3.0 * i as f64);
        assert!(decision.is_allowed(), "got {decision:?}");
    }
    assert_eq!(detector.reputation("10.0.0.6", T0), Some(100.0));
    assert!(!detector.detect_burst("10.0.0.6", T0 + 12.0));
    assert_eq!(detector.block_expiry("10.0.0.6", T0 + 12.0), None);
    Ok(())
}

#[test]
fn test_accepted_requests_never_exceed_ceilings() -> TestResult {
    let detector = default_detector()?;
    let class = EndpointClass::Registration;
    let limits = detector.config().limits.for_class(class);
    let key = "10.0.0.7";

    let mut accepted: Vec<f64> = Vec::new();
    let mut t = T0;
    while t < T0 + 7_200.0 {
        if detector.check_request(key, class, t).is_allowed() {
            accepted.push(t);
            let in_minute = accepted.iter().filter(|&&a| a > t - 60.0).count();
            let in_hour = accepted.iter().filter(|&&a| a > t - 3_600.0).count();
            assert!(in_minute <= limits.per_minute as usize, "{in_minute} accepted in a minute at {t}");
            assert!(in_hour <= limits.per_hour as usize, "{in_hour} accepted in an hour at {t}");
        }
        t += 7.0;
    }
    assert!(!accepted.is_empty());
    Ok(())
}

#[test]
fn test_hour_ceiling() -> TestResult {
    let mut cfg = Config::default();
    cfg.limits.general = ClassLimits::new(5, 6);
    let detector = AbuseDetector::new(cfg)?;
    let key = "10.0.0.8";

    for i in 0..6 {
        let decision = detector.check_request(key, EndpointClass::General, T0 + 20.0 * i as f64);
        assert!(decision.is_allowed(), "got {decision:?}");
    }
    let decision = detector.check_request(key, EndpointClass::General, T0 + 120.0);
    assert_eq!(
        decision,
        Decision::RateLimited { retry_after: 3_480, reason: DenyReason::HourLimitExceeded }
    );
    Ok(())
}

#[test]
fn test_warned_state() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.0.9";
    let class = EndpointClass::Registration;

    for i in 0..3 {
        detector.check_request(key, class, T0 + 3.0 * i as f64);
    }
    assert_eq!(detector.status(key, class, T0 + 9.0), ClientStatus::Normal);

    let decision = detector.check_request(key, class, T0 + 9.0);
    assert_eq!(decision, Decision::Allow { remaining: 1, warned: true, burst: false });
    assert_eq!(detector.status(key, class, T0 + 9.0), ClientStatus::Warned);

    let decision = detector.check_request(key, class, T0 + 12.0);
    assert_eq!(decision, Decision::Allow { remaining: 0, warned: true, burst: false });
    assert_eq!(detector.status(key, class, T0 + 12.0), ClientStatus::Limited);

    // other classes are unaffected
    assert_eq!(detector.status(key, EndpointClass::General, T0 + 12.0), ClientStatus::Normal);
    assert_eq!(detector.status("never-seen", class, T0), ClientStatus::Normal);
    Ok(())
}

#[test]
fn test_reputation_penalties_exact() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.1.1";

    assert_eq!(detector.update_reputation(key, ReputationEvent::RateLimitHit, T0), 90.0);
    assert_eq!(detector.update_reputation(key, ReputationEvent::BurstDetected, T0), 70.0);
    assert_eq!(detector.update_reputation(key, ReputationEvent::SuspiciousPattern, T0), 45.0);

    // no recovery without penalties
    for i in 1..10 {
        assert!(detector.check_request(key, EndpointClass::General, T0 + 600.0 * i as f64).is_allowed());
        assert_eq!(detector.reputation(key, T0), Some(45.0));
    }

    for _ in 0..5 {
        detector.update_reputation(key, ReputationEvent::SuspiciousPattern, T0 + 6_000.0);
    }
    assert_eq!(detector.reputation(key, T0), Some(0.0));
    Ok(())
}

#[test]
fn test_opt_in_recovery() -> TestResult {
    let mut cfg = Config::default();
    cfg.reputation.recovery_per_hour = 20.0;
    let detector = AbuseDetector::new(cfg)?;
    let key = "10.0.1.2";

    assert_eq!(detector.update_reputation(key, ReputationEvent::BurstDetected, T0), 80.0);
    // an hour later 20 points came back before the next penalty
    assert_eq!(
        detector.update_reputation(key, ReputationEvent::RateLimitHit, T0 + 3_600.0),
        90.0
    );

    // reads project pending recovery without storing it
    assert_eq!(detector.reputation(key, T0 + 4_500.0), Some(95.0));
    assert_eq!(detector.reputation(key, T0 + 5_400.0), Some(100.0));
    assert_eq!(detector.reputation(key, T0 + 3_600.0), Some(90.0));
    Ok(())
}

#[test]
fn test_queries_ahead_of_time_keep_minute_ceiling() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.1.6";
    let class = EndpointClass::Registration;

    for i in 0..5 {
        assert!(detector.check_request(key, class, T0 + 10.0 * i as f64).is_allowed());
    }

    // read-only queries far ahead of the request stream
    assert_eq!(detector.status(key, class, T0 + 4_000.0), ClientStatus::Normal);
    assert_eq!(detector.block_expiry(key, T0 + 4_000.0), None);
    assert!(!detector.detect_burst(key, T0 + 4_000.0));
    assert_eq!(detector.compute_block_duration(key, T0 + 4_000.0).as_secs(), 60);
    assert_eq!(detector.reputation(key, T0 + 4_000.0), Some(100.0));

    // the five accepted requests still count for the next minute
    let decision = detector.check_request(key, class, T0 + 45.0);
    assert_eq!(
        decision,
        Decision::RateLimited { retry_after: 15, reason: DenyReason::MinuteLimitExceeded }
    );
    assert_eq!(detector.status(key, class, T0 + 45.0), ClientStatus::Limited);
    Ok(())
}

#[test]
fn test_both_ceilings_report_longest_wait() -> TestResult {
    let mut cfg = Config::default();
    cfg.limits.general = ClassLimits::new(5, 5);
    let detector = AbuseDetector::new(cfg)?;
    let key = "10.0.1.7";

    for i in 0..5 {
        assert!(detector.check_request(key, EndpointClass::General, T0 + i as f64).is_allowed());
    }

    let decision = detector.check_request(key, EndpointClass::General, T0 + 10.0);
    assert_eq!(
        decision,
        Decision::RateLimited { retry_after: 3_590, reason: DenyReason::MinuteLimitExceeded }
    );
    assert_eq!(detector.reputation(key, T0 + 10.0), Some(90.0));

    // following the hint succeeds without another penalty
    let decision = detector.check_request(key, EndpointClass::General, T0 + 3_600.0);
    assert!(decision.is_allowed(), "got {decision:?}");
    assert_eq!(detector.reputation(key, T0 + 3_600.0), Some(90.0));
    Ok(())
}

#[test]
fn test_missing_client_shares_unknown_bucket() -> TestResult {
    let detector = default_detector()?;

    detector.update_reputation("", ReputationEvent::RateLimitHit, T0);
    detector.update_reputation("   ", ReputationEvent::RateLimitHit, T0);
    assert_eq!(detector.reputation(UNKNOWN_CLIENT, T0), Some(80.0));
    assert_eq!(detector.reputation("", T0), Some(80.0));
    assert_eq!(detector.stats().tracked_clients, 1);
    Ok(())
}

#[test]
fn test_invalid_timestamps_do_not_break_state() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.1.3";

    assert!(detector.check_request(key, EndpointClass::General, T0).is_allowed());
    assert!(detector.check_request(key, EndpointClass::General, f64::NAN).is_allowed());
    assert!(detector.check_request(key, EndpointClass::General, -5.0).is_allowed());
    assert!(detector.check_request(key, EndpointClass::General, f64::INFINITY).is_allowed());
    // backwards in time is clamped to the last seen timestamp
    assert!(detector.check_request(key, EndpointClass::General, T0 - 100.0).is_allowed());

    // all five landed at T0, the sixth attempt crosses the burst threshold
    assert!(!detector.detect_burst(key, T0));
    let decision = detector.check_request(key, EndpointClass::General, T0 + 0.5);
    assert_eq!(decision, Decision::Allow { remaining: 54, warned: false, burst: true });
    Ok(())
}

#[test]
fn test_stats_counts_outcomes() -> TestResult {
    let detector = default_detector()?;
    let key = "10.0.1.4";

    for i in 0..5 {
        detector.check_request(key, EndpointClass::Registration, T0 + 3.0 * i as f64);
    }
    detector.check_request(key, EndpointClass::Registration, T0 + 15.0);
    for i in 0..6 {
        detector.check_request("10.0.1.5", EndpointClass::Registration, T0 + 0.1 * i as f64);
    }
    detector.check_request("10.0.1.5", EndpointClass::Registration, T0 + 1.0);

    let stats = detector.stats();
    assert_eq!(stats.tracked_clients, 2);
    assert_eq!(stats.allowed_total, 10);
    assert_eq!(stats.rate_limited_total, 1);
    assert_eq!(stats.blocked_total, 2);
    assert_eq!(stats.block_records, 1);
    Ok(())
}
