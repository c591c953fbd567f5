use warden_lib::config::{Config, EndpointClass, ReputationEvent};
use warden_lib::AbuseDetector;

use super::{default_detector, TestResult, T0};

#[test]
fn test_idle_clients_evicted_after_ttl() -> TestResult {
    let detector = default_detector()?;
    let ttl = detector.config().eviction.idle_ttl_secs as f64;

    detector.check_request("a", EndpointClass::General, T0);
    detector.check_request("b", EndpointClass::General, T0 + 100.0);

    assert_eq!(detector.sweep_idle(T0 + ttl - 1.0), 0);
    assert_eq!(detector.sweep_idle(T0 + ttl), 1);
    assert_eq!(detector.reputation("a", T0), None);
    assert!(detector.reputation("b", T0).is_some());
    assert_eq!(detector.stats().tracked_clients, 1);
    Ok(())
}

#[test]
fn test_blocked_clients_survive_sweep() -> TestResult {
    let mut cfg = Config::default();
    cfg.blocking.base_secs = 20_000;
    cfg.blocking.max_secs = 86_400;
    let detector = AbuseDetector::new(cfg)?;
    let key = "192.0.2.50";

    for i in 0..6 {
        detector.check_request(key, EndpointClass::Registration, T0 + 0.1 * i as f64);
    }
    let expiry = detector.block_expiry(key, T0 + 1.0).unwrap_or_default();
    assert!(expiry > T0 + 10_000.0);

    assert_eq!(detector.sweep_idle(T0 + 10_000.0), 0);
    assert!(detector.block_expiry(key, T0 + 10_000.0).is_some());

    // idle time counts from the end of the block
    assert_eq!(detector.sweep_idle(expiry + 100.0), 0);
    assert_eq!(detector.sweep_idle(expiry + 7_200.0), 1);
    Ok(())
}

#[test]
fn test_eviction_resets_reputation() -> TestResult {
    let detector = default_detector()?;
    let key = "192.0.2.51";

    detector.update_reputation(key, ReputationEvent::BurstDetected, T0);
    assert_eq!(detector.reputation(key, T0), Some(80.0));

    assert_eq!(detector.sweep_idle(T0 + 7_200.0), 1);
    assert!(detector.check_request(key, EndpointClass::General, T0 + 7_201.0).is_allowed());
    assert_eq!(detector.reputation(key, T0), Some(100.0));
    Ok(())
}

#[test]
fn test_sweep_with_invalid_time_is_ignored() -> TestResult {
    let detector = default_detector()?;
    detector.check_request("a", EndpointClass::General, T0);
    assert_eq!(detector.sweep_idle(f64::NAN), 0);
    assert_eq!(detector.sweep_idle(-1.0), 0);
    assert_eq!(detector.stats().tracked_clients, 1);
    Ok(())
}

#[test]
fn test_steady_traffic_is_never_limited() -> TestResult {
    let detector = default_detector()?;
    let key = "192.0.2.52";

    // one request every 4s for five hours stays under both general ceilings
    for i in 0..4_500 {
        let decision = detector.check_request(key, EndpointClass::General, T0 + 4.0 * i as f64);
        assert!(decision.is_allowed(), "request {i}: {decision:?}");
    }
    Ok(())
}
