//! Worker and coordinator configuration.
//!
//! Loading from files or the environment is left to the embedding binary;
//! these structs only carry defaults and builder setters.

use std::time::Duration;

use rand::Rng;

use crate::domain::report::DEFAULT_MESSAGE_LIMIT;
use crate::lease::EligibilityPolicy;
use crate::ports::FieldLimits;

/// Worker-side settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Coordinator addresses, primary first.
    pub servers: Vec<String>,

    /// Application the worker's jobs belong to.
    pub app_id: String,

    /// Shared secret presented to the coordinator, if it asks for one.
    pub secret: Option<String>,

    /// How long a fetched job definition stays fresh.
    pub job_refresh_interval: Duration,

    /// Tasks requested per acquire call.
    pub acquire_count: usize,

    /// Base sleep when an acquire returns nothing. Jittered by up to 50%.
    pub idle_delay: Duration,

    /// Heartbeat period while a task runs.
    pub progress_interval: Duration,

    /// Finish messages are cut to this many characters before sending.
    pub message_limit: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            app_id: env!("CARGO_PKG_NAME").to_string(),
            secret: None,
            job_refresh_interval: Duration::from_secs(5),
            acquire_count: 1,
            idle_delay: Duration::from_secs(1),
            progress_interval: Duration::from_secs(10),
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

impl WorkerConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    /// Split a comma-separated server list, dropping blanks.
    pub fn parse_servers(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn with_servers(mut self, raw: &str) -> Self {
        self.servers = Self::parse_servers(raw);
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_acquire_count(mut self, count: usize) -> Self {
        self.acquire_count = count.max(1);
        self
    }

    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_job_refresh_interval(mut self, interval: Duration) -> Self {
        self.job_refresh_interval = interval;
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit;
        self
    }

    pub fn primary(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }

    /// Idle sleep with random jitter in `[idle_delay, 1.5 * idle_delay]`.
    pub fn jittered_idle_delay(&self) -> Duration {
        let base = self.idle_delay.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

/// Coordinator-side settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub app_id: String,
    pub policy: EligibilityPolicy,
    pub field_limits: FieldLimits,

    /// Leases older than this with no report are expired. `None` leaves
    /// stuck leases to a manual reset.
    pub lease_ttl: Option<chrono::Duration>,

    /// Upper bound on windows produced per job per scheduling tick.
    pub max_windows_per_tick: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            app_id: env!("CARGO_PKG_NAME").to_string(),
            policy: EligibilityPolicy::default(),
            field_limits: FieldLimits::default(),
            lease_ttl: None,
            max_windows_per_tick: 16,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: EligibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_field_limits(mut self, limits: FieldLimits) -> Self {
        self.field_limits = limits;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.lease_ttl = Some(ttl);
        self
    }

    pub fn with_max_windows_per_tick(mut self, max: usize) -> Self {
        self.max_windows_per_tick = max.max(1);
        self
    }
}
