//! Sharded per-client state and the request decision logic.
//!
//! Client state lives in `shards` independently locked maps. The shard is
//! chosen by hashing the client key, so every evaluation for one client is
//! serialized while unrelated clients rarely share a lock.

use ahash::{AHashMap, RandomState};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{validate, ClassLimits, Config, EndpointClass, ReputationEvent};
use crate::error::{Result, WardenError};
use crate::security::ip_filter::is_exempt;
use crate::telemetry::Metrics;

use super::block::{escalated_duration, BlockRecord, OffenseHistory};
use super::classify::EndpointClassifier;
use super::decision::{ClientStatus, Decision, DenyReason};
use super::hash;
use super::reputation::Reputation;
use super::window::{seconds_ceil, RequestWindow, HOUR_SECS, MINUTE_SECS};

/// Bucket shared by requests that arrive without a client identifier
pub const UNKNOWN_CLIENT: &str = "unknown";

type ClientMap = AHashMap<String, ClientState>;

#[derive(Debug, Clone)]
struct ClientState {
    /// Accepted requests, indexed by `EndpointClass::index`
    windows: [RequestWindow; 4],
    /// Every non-blocked evaluation, across classes
    attempts: RequestWindow,
    reputation: Reputation,
    block: Option<BlockRecord>,
    offenses: OffenseHistory,
    last_seen: f64,
    /// Latest timestamp the state was purged at, read-only queries included
    refreshed_at: f64,
}

impl ClientState {
    fn new(config: &Config, now: f64) -> Self {
        Self {
            windows: Default::default(),
            attempts: RequestWindow::new(),
            reputation: Reputation::new(&config.reputation, now),
            block: None,
            offenses: OffenseHistory::default(),
            last_seen: now,
            refreshed_at: now,
        }
    }

    /// Purge expired entries, apply recovery and drop an expired block.
    fn refresh(&mut self, config: &Config, now: f64) {
        self.refreshed_at = self.refreshed_at.max(now);
        for window in &mut self.windows {
            window.purge(now, HOUR_SECS);
        }
        self.attempts.purge(now, config.burst.window_secs);
        self.offenses.purge(now, config.blocking.offense_window_secs);
        self.reputation.recover(&config.reputation, now);
        if self.block.is_some_and(|b| !b.is_active(now)) {
            self.block = None;
        }
    }

    fn active_block(&self, now: f64) -> Option<BlockRecord> {
        self.block.filter(|b| b.is_active(now))
    }

    fn last_activity(&self) -> f64 {
        self.block
            .map_or(self.last_seen, |b| b.expires_at.max(self.last_seen))
    }
}

#[derive(Debug, Clone, Copy)]
enum Ceiling {
    Minute,
    Hour,
}

impl Ceiling {
    fn window_secs(self) -> f64 {
        match self {
            Ceiling::Minute => MINUTE_SECS,
            Ceiling::Hour => HOUR_SECS,
        }
    }

    fn limit(self, limits: ClassLimits) -> u32 {
        match self {
            Ceiling::Minute => limits.per_minute,
            Ceiling::Hour => limits.per_hour,
        }
    }

    fn reason(self) -> DenyReason {
        match self {
            Ceiling::Minute => DenyReason::MinuteLimitExceeded,
            Ceiling::Hour => DenyReason::HourLimitExceeded,
        }
    }
}

/// Snapshot of detector-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Clients currently holding state
    pub tracked_clients: usize,
    /// Clients holding a block record (expired records are cleared lazily)
    pub block_records: usize,
    pub allowed_total: u64,
    pub rate_limited_total: u64,
    pub blocked_total: u64,
}

/// Adaptive rate limiter and abuse detector.
///
/// Constructed once at startup and shared as `Arc<AbuseDetector>`. All
/// operations are synchronous, in-memory and infallible; timestamps are
/// seconds supplied by the caller.
pub struct AbuseDetector {
    config: Config,
    classifier: EndpointClassifier,
    shards: Box<[Mutex<ClientMap>]>,
    hasher: RandomState,
    metrics: Option<Arc<Metrics>>,
    allowed_total: AtomicU64,
    limited_total: AtomicU64,
    blocked_total: AtomicU64,
}

impl AbuseDetector {
    /// Create a detector, rejecting an invalid configuration.
    pub fn new(config: Config) -> Result<Self> {
        validate(&config).map_err(WardenError::Config)?;

        let classifier =
            EndpointClassifier::new(config.rules.clone(), &config.suspicious_patterns);
        let shards = (0..config.shards)
            .map(|_| Mutex::new(ClientMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            config,
            classifier,
            shards,
            hasher: RandomState::new(),
            metrics: None,
            allowed_total: AtomicU64::new(0),
            limited_total: AtomicU64::new(0),
            blocked_total: AtomicU64::new(0),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Map a request path to its endpoint class.
    pub fn classify_endpoint(&self, path: &str) -> EndpointClass {
        self.classifier.classify(path)
    }

    /// Full per-request entry point: exemption, classification, suspicious
    /// path inspection, then [`check_request`](Self::check_request).
    pub fn evaluate(&self, client_address: &str, path: &str, now: f64) -> Decision {
        if is_exempt(client_address, &self.config.exempt) {
            debug!(client = client_address, path, "exempt client, skipping limits");
            if let Some(m) = &self.metrics {
                m.record_exempt();
            }
            return Decision::exempt();
        }

        let class = self.classifier.classify(path);
        let decision = self.with_client(client_address, now, |state, key, now| {
            if let Some(pattern) = self.classifier.suspicious_match(path) {
                if state.active_block(now).is_none() {
                    warn!(client = key, path, pattern, "suspicious request path");
                    state.last_seen = now;
                    self.penalize(state, key, ReputationEvent::SuspiciousPattern);
                    if state
                        .reputation
                        .is_below(self.config.reputation.block_threshold)
                    {
                        let reason = DenyReason::SuspiciousPattern;
                        let duration = self.start_block(state, key, reason, now);
                        return Decision::Blocked {
                            retry_after: seconds_ceil(duration.as_secs_f64()),
                            reason,
                        };
                    }
                }
            }
            self.decide(state, key, class, now)
        });
        self.finish(class, decision)
    }

    /// Decide on one request for `client_key` against `class` at `now`.
    pub fn check_request(&self, client_key: &str, class: EndpointClass, now: f64) -> Decision {
        let decision =
            self.with_client(client_key, now, |state, key, now| self.decide(state, key, class, now));
        self.finish(class, decision)
    }

    /// Whether the client made more than `burst.threshold` attempts within
    /// the trailing burst window. Does not record anything.
    pub fn detect_burst(&self, client_key: &str, now: f64) -> bool {
        self.with_existing(client_key, now, |state, _, now| self.is_bursting(state, now))
            .unwrap_or(false)
    }

    /// Duration the client's next block would last.
    pub fn compute_block_duration(&self, client_key: &str, now: f64) -> Duration {
        let prior = self
            .with_existing(client_key, now, |state, _, now| {
                state
                    .offenses
                    .count_within(now, self.config.blocking.offense_window_secs)
            })
            .unwrap_or(0);
        escalated_duration(&self.config.blocking, prior)
    }

    /// Apply the penalty for `event` and return the new score.
    pub fn update_reputation(&self, client_key: &str, event: ReputationEvent, now: f64) -> f64 {
        self.with_client(client_key, now, |state, key, now| {
            state.last_seen = now;
            self.penalize(state, key, event)
        })
    }

    /// Current state-machine position of the client for `class`.
    pub fn status(&self, client_key: &str, class: EndpointClass, now: f64) -> ClientStatus {
        self.with_existing(client_key, now, |state, _, now| {
            if state.active_block(now).is_some() {
                return ClientStatus::Blocked;
            }
            let limits = self.config.limits.for_class(class);
            let window = &state.windows[class.index()];
            let minute = window.count_within(now, MINUTE_SECS);
            let hour = window.count_within(now, HOUR_SECS);
            if minute >= limits.per_minute as usize || hour >= limits.per_hour as usize {
                ClientStatus::Limited
            } else if self.is_warned(limits, minute, hour) {
                ClientStatus::Warned
            } else {
                ClientStatus::Normal
            }
        })
        .unwrap_or(ClientStatus::Normal)
    }

    /// Reputation score at `now` including pending recovery, `None` for a
    /// client never seen. Does not modify the stored state.
    pub fn reputation(&self, client_key: &str, now: f64) -> Option<f64> {
        self.with_existing(client_key, now, |state, _, now| {
            let mut reputation = state.reputation;
            reputation.recover(&self.config.reputation, now);
            reputation.score()
        })
    }

    /// Expiry timestamp of the client's active block.
    pub fn block_expiry(&self, client_key: &str, now: f64) -> Option<f64> {
        self.with_existing(client_key, now, |state, _, now| {
            state.active_block(now).map(|b| b.expires_at)
        })
        .flatten()
    }

    /// Forget clients idle for longer than `eviction.idle_ttl_secs` that hold
    /// no active block. Returns the number of evicted clients.
    pub fn sweep_idle(&self, now: f64) -> usize {
        if !now.is_finite() || now < 0.0 {
            warn!(now, "ignoring idle sweep with invalid timestamp");
            return 0;
        }
        let ttl = self.config.eviction.idle_ttl_secs as f64;
        let mut evicted = 0;
        for shard in self.shards.iter() {
            let mut clients = lock_recovering(shard);
            let before = clients.len();
            clients.retain(|_, state| {
                state.active_block(now).is_some() || now - state.last_activity() < ttl
            });
            evicted += before - clients.len();
        }
        if evicted > 0 {
            debug!(evicted, "idle clients evicted");
        }
        if let Some(m) = &self.metrics {
            m.record_evictions(evicted as u64);
        }
        evicted
    }

    pub fn stats(&self) -> LimiterStats {
        let mut tracked_clients = 0;
        let mut block_records = 0;
        for shard in self.shards.iter() {
            let clients = lock_recovering(shard);
            tracked_clients += clients.len();
            block_records += clients.values().filter(|s| s.block.is_some()).count();
        }
        LimiterStats {
            tracked_clients,
            block_records,
            allowed_total: self.allowed_total.load(Ordering::Relaxed),
            rate_limited_total: self.limited_total.load(Ordering::Relaxed),
            blocked_total: self.blocked_total.load(Ordering::Relaxed),
        }
    }

    fn decide(
        &self,
        state: &mut ClientState,
        key: &str,
        class: EndpointClass,
        now: f64,
    ) -> Decision {
        if let Some(block) = state.active_block(now) {
            return Decision::Blocked {
                retry_after: seconds_ceil(block.remaining(now)),
                reason: block.reason,
            };
        }

        state.last_seen = now;
        state.attempts.record(now);
        let burst = self.is_bursting(state, now);

        let limits = self.config.limits.for_class(class);
        let window = &state.windows[class.index()];
        let minute = window.count_within(now, MINUTE_SECS);
        let hour = window.count_within(now, HOUR_SECS);

        let minute_hit = minute >= limits.per_minute as usize;
        let hour_hit = hour >= limits.per_hour as usize;
        let exceeded = if minute_hit {
            Some(Ceiling::Minute)
        } else if hour_hit {
            Some(Ceiling::Hour)
        } else {
            None
        };

        let Some(ceiling) = exceeded else {
            state.windows[class.index()].record(now);
            let (minute, hour) = (minute + 1, hour + 1);
            let remaining = (limits.per_minute as usize)
                .saturating_sub(minute)
                .min((limits.per_hour as usize).saturating_sub(hour));
            let warned = self.is_warned(limits, minute, hour);
            if burst {
                debug!(client = key, class = %class, "burst within limits");
            }
            return Decision::Allow {
                remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
                warned,
                burst,
            };
        };

        self.penalize(state, key, ReputationEvent::RateLimitHit);
        if burst {
            self.penalize(state, key, ReputationEvent::BurstDetected);
        }

        if burst
            || state
                .reputation
                .is_below(self.config.reputation.block_threshold)
        {
            let reason = if burst { DenyReason::BurstDetected } else { DenyReason::LowReputation };
            let duration = self.start_block(state, key, reason, now);
            return Decision::Blocked { retry_after: seconds_ceil(duration.as_secs_f64()), reason };
        }

        // wait for every exceeded ceiling, the reason names the first one
        let window = &state.windows[class.index()];
        let retry_after = [(Ceiling::Minute, minute_hit), (Ceiling::Hour, hour_hit)]
            .into_iter()
            .filter(|&(_, hit)| hit)
            .map(|(c, _)| window.retry_after(now, c.window_secs(), c.limit(limits)))
            .max()
            .unwrap_or(1);
        debug!(
            client = key,
            class = %class,
            minute,
            hour,
            retry_after,
            score = state.reputation.score(),
            "rate limited"
        );
        Decision::RateLimited { retry_after, reason: ceiling.reason() }
    }

    fn is_bursting(&self, state: &ClientState, now: f64) -> bool {
        state.attempts.count_within(now, self.config.burst.window_secs)
            > self.config.burst.threshold as usize
    }

    fn is_warned(&self, limits: ClassLimits, minute: usize, hour: usize) -> bool {
        let ratio = self.config.warn_ratio;
        minute as f64 >= ratio * limits.per_minute as f64
            || hour as f64 >= ratio * limits.per_hour as f64
    }

    fn penalize(&self, state: &mut ClientState, key: &str, event: ReputationEvent) -> f64 {
        let score = state.reputation.penalize(&self.config.reputation, event);
        debug!(client = key, event = %event, score, "reputation penalty applied");
        if let Some(m) = &self.metrics {
            m.record_penalty(event.as_str());
        }
        score
    }

    fn start_block(
        &self,
        state: &mut ClientState,
        key: &str,
        reason: DenyReason,
        now: f64,
    ) -> Duration {
        let prior_offenses = state.offenses.count();
        let duration = escalated_duration(&self.config.blocking, prior_offenses);
        state.offenses.record(now);
        state.block = Some(BlockRecord { expires_at: now + duration.as_secs_f64(), reason });
        info!(
            client = key,
            reason = reason.as_str(),
            prior_offenses,
            duration_secs = duration.as_secs_f64(),
            score = state.reputation.score(),
            "client blocked"
        );
        if let Some(m) = &self.metrics {
            m.record_block(reason.as_str());
        }
        duration
    }

    fn finish(&self, class: EndpointClass, decision: Decision) -> Decision {
        let counter = match &decision {
            Decision::Allow { .. } => &self.allowed_total,
            Decision::RateLimited { .. } => &self.limited_total,
            Decision::Blocked { .. } => &self.blocked_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.record_decision(decision.outcome(), class.as_str());
        }
        decision
    }

    /// Run `f` on the client's refreshed state, creating it on first sight.
    fn with_client<R>(
        &self,
        client_key: &str,
        now: f64,
        f: impl FnOnce(&mut ClientState, &str, f64) -> R,
    ) -> R {
        let key = normalize_key(client_key);
        let mut clients = self.lock_shard(&key);
        let now = normalize_timestamp(clients.get(key.as_str()).map(|s| s.refreshed_at), now, &key);
        let state = clients
            .entry(key.clone())
            .or_insert_with(|| ClientState::new(&self.config, now));
        state.refresh(&self.config, now);
        f(state, &key, now)
    }

    /// Run `f` on the client's state as stored, if the client is known.
    /// Nothing is purged, so a query never moves the client's clock.
    fn with_existing<R>(
        &self,
        client_key: &str,
        now: f64,
        f: impl FnOnce(&ClientState, &str, f64) -> R,
    ) -> Option<R> {
        let key = normalize_key(client_key);
        let clients = self.lock_shard(&key);
        let state = clients.get(key.as_str())?;
        let now = normalize_timestamp(Some(state.refreshed_at), now, &key);
        Some(f(state, &key, now))
    }

    fn lock_shard(&self, key: &str) -> MutexGuard<'_, ClientMap> {
        let index = hash(key, &self.hasher)
            .checked_rem(self.shards.len() as u64)
            .unwrap_or_default() as usize;
        lock_recovering(&self.shards[index])
    }
}

fn lock_recovering(shard: &Mutex<ClientMap>) -> MutexGuard<'_, ClientMap> {
    shard.lock().unwrap_or_else(|poisoned| {
        warn!("Abuse detector shard lock poisoned, recovering");
        poisoned.into_inner()
    })
}

fn normalize_key(client_key: &str) -> String {
    let trimmed = client_key.trim();
    if trimmed.is_empty() {
        UNKNOWN_CLIENT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace invalid or backwards timestamps with the client's own clock, the
/// latest timestamp its state was refreshed at.
fn normalize_timestamp(clock: Option<f64>, now: f64, key: &str) -> f64 {
    let floor = clock.unwrap_or(0.0);
    if !now.is_finite() || now < 0.0 {
        warn!(client = key, now, "invalid timestamp, using client clock");
        return floor;
    }
    if now < floor {
        debug!(client = key, now, clock = floor, "timestamp went backwards, clamping");
        return floor;
    }
    now
}
