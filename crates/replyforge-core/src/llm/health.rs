//! Provider health tracking and scoring.
//!
//! Implements a circuit breaker per provider plus a decayed success/latency
//! window, producing the ranking score used by the registry. Failures above
//! the configured consecutive-failure threshold open the circuit for a
//! cooldown that doubles on every failed half-open probe, up to a bounded
//! maximum.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use replyforge_types::config::HealthConfig;
use replyforge_types::llm::{ProviderError, ProviderHealthInfo};

/// Relative weight of the success-rate term in the ranking score.
const SUCCESS_WEIGHT: f64 = 0.7;

/// Relative weight of the inverse-latency term in the ranking score.
const LATENCY_WEIGHT: f64 = 0.3;

/// Smoothing factor for the latency EWMA.
const LATENCY_ALPHA: f64 = 0.3;

/// Circuit breaker state for a provider.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward the threshold.
    Closed { consecutive_failures: u32 },
    /// Provider is excluded from ranking until `cooldown` elapses.
    Open { opened_at: Instant, cooldown: Duration },
    /// Cooldown elapsed: exactly one trial call is allowed.
    HalfOpen { probing: bool },
}

/// Permission to call a provider, handed out by [`HealthMonitor::begin_attempt`].
#[derive(Debug, Clone, Copy)]
pub struct AttemptPermit {
    /// True when this call is the single half-open trial; the caller must
    /// not retry the provider within the same dispatch.
    pub probe: bool,
}

/// Health tracking for a single provider.
#[derive(Debug)]
pub struct ProviderHealth {
    pub name: String,
    state: CircuitState,
    /// Exponentially decayed success/failure counts.
    success_weight: f64,
    failure_weight: f64,
    last_decay: Instant,
    /// EWMA of successful-call latency in milliseconds.
    avg_latency_ms: Option<f64>,
    /// Current open-circuit cooldown; doubles per failed probe.
    cooldown: Duration,
    pub last_error: Option<String>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,

    failure_threshold: u32,
    base_cooldown: Duration,
    max_cooldown: Duration,
    decay_half_life: Duration,
}

impl ProviderHealth {
    pub fn new(name: impl Into<String>, config: &HealthConfig) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            success_weight: 0.0,
            failure_weight: 0.0,
            last_decay: Instant::now(),
            avg_latency_ms: None,
            cooldown: Duration::from_millis(config.base_cooldown_ms),
            last_error: None,
            last_latency_ms: None,
            total_calls: 0,
            total_failures: 0,
            failure_threshold: config.failure_threshold,
            base_cooldown: Duration::from_millis(config.base_cooldown_ms),
            max_cooldown: Duration::from_millis(config.max_cooldown_ms),
            decay_half_life: Duration::from_secs(config.decay_half_life_secs),
        }
    }

    /// Apply exponential decay to the windowed counts.
    fn decay(&mut self) {
        let elapsed = self.last_decay.elapsed();
        if elapsed.is_zero() {
            return;
        }
        let half_lives = elapsed.as_secs_f64() / self.decay_half_life.as_secs_f64();
        let factor = 0.5f64.powf(half_lives);
        self.success_weight *= factor;
        self.failure_weight *= factor;
        self.last_decay = Instant::now();
    }

    /// Transition Open -> HalfOpen once the cooldown has elapsed.
    fn refresh(&mut self) {
        if let CircuitState::Open { opened_at, cooldown } = &self.state {
            if opened_at.elapsed() >= *cooldown {
                self.state = CircuitState::HalfOpen { probing: false };
            }
        }
    }

    /// Request permission to call this provider.
    ///
    /// Returns `None` while the circuit is open or another half-open probe
    /// is already in flight.
    pub fn begin_attempt(&mut self) -> Option<AttemptPermit> {
        self.refresh();
        match &mut self.state {
            CircuitState::Closed { .. } => Some(AttemptPermit { probe: false }),
            CircuitState::Open { .. } => None,
            CircuitState::HalfOpen { probing } => {
                if *probing {
                    None
                } else {
                    *probing = true;
                    Some(AttemptPermit { probe: true })
                }
            }
        }
    }

    /// Release an unused half-open probe slot.
    ///
    /// A probe permit that will never record an outcome (a cancelled
    /// stream) must be released, or the provider would stay excluded from
    /// ranking forever.
    pub fn abandon_probe(&mut self) {
        if let CircuitState::HalfOpen { probing } = &mut self.state {
            *probing = false;
        }
    }

    /// Record a successful call.
    pub fn record_success(&mut self, latency_ms: u64) {
        self.decay();
        self.total_calls += 1;
        self.success_weight += 1.0;
        self.last_latency_ms = Some(latency_ms);
        self.avg_latency_ms = Some(match self.avg_latency_ms {
            Some(avg) => (1.0 - LATENCY_ALPHA) * avg + LATENCY_ALPHA * latency_ms as f64,
            None => latency_ms as f64,
        });

        match &self.state {
            CircuitState::HalfOpen { .. } | CircuitState::Open { .. } => {
                // Recovery confirmed: close the circuit and reset the cooldown.
                self.state = CircuitState::Closed {
                    consecutive_failures: 0,
                };
                self.cooldown = self.base_cooldown;
            }
            CircuitState::Closed { .. } => {
                self.state = CircuitState::Closed {
                    consecutive_failures: 0,
                };
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&mut self, error: &ProviderError, latency_ms: u64) {
        self.decay();
        self.total_calls += 1;
        self.total_failures += 1;
        self.failure_weight += 1.0;
        self.last_error = Some(error.to_string());
        self.last_latency_ms = Some(latency_ms);

        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let new_count = consecutive_failures + 1;
                if new_count >= self.failure_threshold {
                    self.state = CircuitState::Open {
                        opened_at: Instant::now(),
                        cooldown: self.cooldown,
                    };
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: new_count,
                    };
                }
            }
            CircuitState::HalfOpen { .. } => {
                // Probe failed: re-open with doubled cooldown, bounded.
                self.cooldown = (self.cooldown * 2).min(self.max_cooldown);
                self.state = CircuitState::Open {
                    opened_at: Instant::now(),
                    cooldown: self.cooldown,
                };
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Ranking score. Circuit-open providers (and providers whose single
    /// half-open trial is already in flight) score negative infinity and
    /// are never selected.
    pub fn score(&mut self) -> f64 {
        self.refresh();
        if matches!(self.state, CircuitState::Open { .. })
            || matches!(self.state, CircuitState::HalfOpen { probing: true })
        {
            return f64::NEG_INFINITY;
        }

        self.decay();
        let total = self.success_weight + self.failure_weight;
        let success_rate = if total < f64::EPSILON {
            1.0
        } else {
            self.success_weight / total
        };
        let latency_s = self.avg_latency_ms.unwrap_or(0.0) / 1000.0;
        SUCCESS_WEIGHT * success_rate + LATENCY_WEIGHT / (1.0 + latency_s)
    }

    /// Current circuit state name ("closed", "open", "half_open").
    pub fn circuit_state_name(&self) -> &'static str {
        match &self.state {
            CircuitState::Closed { .. } => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen { .. } => "half_open",
        }
    }

    fn to_info(&mut self) -> ProviderHealthInfo {
        let score = self.score();
        ProviderHealthInfo {
            name: self.name.clone(),
            circuit_state: self.circuit_state_name().to_string(),
            score: score.is_finite().then_some(score),
            last_error: self.last_error.clone(),
            last_latency_ms: self.last_latency_ms,
            total_calls: self.total_calls,
            total_failures: self.total_failures,
        }
    }
}

/// Concurrent health tracking for all configured providers.
///
/// Outcomes are recorded by the dispatcher after every call; scores are
/// read by the registry for ranking. Mutation is synchronized per
/// provider through the map's sharded locks.
pub struct HealthMonitor {
    providers: DashMap<String, ProviderHealth>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            providers: DashMap::new(),
            config,
        }
    }

    /// Ensure a tracker exists for the named provider.
    pub fn register(&self, name: &str) {
        self.providers
            .entry(name.to_string())
            .or_insert_with(|| ProviderHealth::new(name, &self.config));
    }

    /// Request permission to call the named provider.
    pub fn begin_attempt(&self, name: &str) -> Option<AttemptPermit> {
        self.register(name);
        self.providers
            .get_mut(name)
            .and_then(|mut h| h.begin_attempt())
    }

    /// Release an unused half-open probe slot for the named provider.
    pub fn abandon_probe(&self, name: &str) {
        if let Some(mut h) = self.providers.get_mut(name) {
            h.abandon_probe();
        }
    }

    pub fn record_success(&self, name: &str, latency_ms: u64) {
        self.register(name);
        if let Some(mut h) = self.providers.get_mut(name) {
            h.record_success(latency_ms);
        }
    }

    pub fn record_failure(&self, name: &str, error: &ProviderError, latency_ms: u64) {
        self.register(name);
        if let Some(mut h) = self.providers.get_mut(name) {
            h.record_failure(error, latency_ms);
        }
    }

    /// Ranking score for the named provider. Providers with no recorded
    /// history score as fully healthy.
    pub fn score(&self, name: &str) -> f64 {
        self.register(name);
        self.providers
            .get_mut(name)
            .map(|mut h| h.score())
            .unwrap_or(f64::NEG_INFINITY)
    }

    /// Point-in-time health of every tracked provider, sorted by name.
    /// This is the read side of the administrative surface.
    pub fn snapshot(&self) -> Vec<ProviderHealthInfo> {
        let mut infos: Vec<ProviderHealthInfo> = self
            .providers
            .iter_mut()
            .map(|mut entry| entry.to_info())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> HealthConfig {
        HealthConfig {
            failure_threshold: 3,
            base_cooldown_ms: 20,
            max_cooldown_ms: 100,
            decay_half_life_secs: 300,
        }
    }

    fn transport_err() -> ProviderError {
        ProviderError::Transport("connection reset".to_string())
    }

    #[test]
    fn test_new_provider_scores_healthy() {
        let mut health = ProviderHealth::new("openai", &HealthConfig::default());
        let score = health.score();
        assert!((score - 1.0).abs() < 1e-9);
        assert_eq!(health.circuit_state_name(), "closed");
    }

    #[test]
    fn test_circuit_opens_after_threshold_failures() {
        let mut health = ProviderHealth::new("openai", &fast_config());
        let err = transport_err();

        health.record_failure(&err, 100);
        health.record_failure(&err, 100);
        assert!(health.begin_attempt().is_some());

        health.record_failure(&err, 100);
        assert_eq!(health.circuit_state_name(), "open");
        assert!(health.begin_attempt().is_none());
        assert_eq!(health.score(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let mut health = ProviderHealth::new("openai", &fast_config());
        let err = transport_err();

        health.record_failure(&err, 100);
        health.record_failure(&err, 100);
        health.record_success(50);
        health.record_failure(&err, 100);
        health.record_failure(&err, 100);
        assert_eq!(health.circuit_state_name(), "closed");
    }

    #[test]
    fn test_half_open_allows_exactly_one_probe() {
        let mut health = ProviderHealth::new("openai", &fast_config());
        let err = transport_err();
        for _ in 0..3 {
            health.record_failure(&err, 100);
        }
        assert!(health.begin_attempt().is_none());

        std::thread::sleep(Duration::from_millis(25));

        let permit = health.begin_attempt().expect("probe after cooldown");
        assert!(permit.probe);
        assert_eq!(health.circuit_state_name(), "half_open");
        // Second concurrent attempt is denied while the probe is in flight.
        assert!(health.begin_attempt().is_none());
    }

    #[test]
    fn test_abandon_probe_releases_slot() {
        let mut health = ProviderHealth::new("openai", &fast_config());
        let err = transport_err();
        for _ in 0..3 {
            health.record_failure(&err, 100);
        }
        std::thread::sleep(Duration::from_millis(25));

        health.begin_attempt().expect("probe");
        assert!(health.begin_attempt().is_none());

        health.abandon_probe();
        let permit = health.begin_attempt().expect("released slot");
        assert!(permit.probe);
    }

    #[test]
    fn test_probe_success_closes_circuit() {
        let mut health = ProviderHealth::new("openai", &fast_config());
        let err = transport_err();
        for _ in 0..3 {
            health.record_failure(&err, 100);
        }
        std::thread::sleep(Duration::from_millis(25));
        health.begin_attempt().expect("probe");
        health.record_success(50);
        assert_eq!(health.circuit_state_name(), "closed");
        assert!(health.begin_attempt().is_some());
    }

    #[test]
    fn test_probe_failure_doubles_cooldown_bounded() {
        let mut health = ProviderHealth::new("openai", &fast_config());
        let err = transport_err();
        for _ in 0..3 {
            health.record_failure(&err, 100);
        }
        assert_eq!(health.cooldown, Duration::from_millis(20));

        std::thread::sleep(Duration::from_millis(25));
        health.begin_attempt().expect("first probe");
        health.record_failure(&err, 100);
        assert_eq!(health.cooldown, Duration::from_millis(40));
        assert_eq!(health.circuit_state_name(), "open");

        std::thread::sleep(Duration::from_millis(45));
        health.begin_attempt().expect("second probe");
        health.record_failure(&err, 100);
        assert_eq!(health.cooldown, Duration::from_millis(80));

        std::thread::sleep(Duration::from_millis(85));
        health.begin_attempt().expect("third probe");
        health.record_failure(&err, 100);
        // Bounded at max_cooldown_ms.
        assert_eq!(health.cooldown, Duration::from_millis(100));
    }

    #[test]
    fn test_failing_provider_scores_below_succeeding() {
        let config = HealthConfig::default();
        let mut failing = ProviderHealth::new("bad", &config);
        let mut succeeding = ProviderHealth::new("good", &config);
        let err = transport_err();

        // Two failures: below the threshold, circuit still closed.
        failing.record_failure(&err, 100);
        failing.record_failure(&err, 100);
        succeeding.record_success(100);
        succeeding.record_success(100);

        assert!(failing.score() < succeeding.score());
    }

    #[test]
    fn test_lower_latency_scores_higher() {
        let config = HealthConfig::default();
        let mut fast = ProviderHealth::new("fast", &config);
        let mut slow = ProviderHealth::new("slow", &config);

        fast.record_success(50);
        slow.record_success(5000);

        assert!(fast.score() > slow.score());
    }

    #[test]
    fn test_stale_failures_decay() {
        let config = HealthConfig {
            decay_half_life_secs: 1,
            ..fast_config()
        };
        let mut health = ProviderHealth::new("openai", &config);
        let err = transport_err();
        health.record_failure(&err, 100);
        health.record_failure(&err, 100);
        let penalized = health.score();

        // last_decay is private state; simulate the passage of several
        // half-lives by back-dating it.
        health.last_decay = Instant::now() - Duration::from_secs(30);
        let recovered = health.score();
        assert!(recovered > penalized);
    }

    #[test]
    fn test_monitor_snapshot_sorted_by_name() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        monitor.register("gemini");
        monitor.register("anthropic");
        monitor.register("openai");
        monitor.record_failure("openai", &transport_err(), 123);

        let snapshot = monitor.snapshot();
        let names: Vec<&str> = snapshot.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["anthropic", "gemini", "openai"]);

        let openai = &snapshot[2];
        assert_eq!(openai.total_failures, 1);
        assert_eq!(openai.last_latency_ms, Some(123));
        assert!(openai.last_error.as_deref().unwrap().contains("connection reset"));
    }

    #[test]
    fn test_monitor_unknown_provider_scores_healthy() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        assert!((monitor.score("fresh") - 1.0).abs() < 1e-9);
    }
}
