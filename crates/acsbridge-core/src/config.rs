// ── Runtime configuration ──
//
// These types describe how to reach the ACS and how hard to try when
// pushing changes. They carry credential data and tuning, but never
// touch disk. The CLI builds them from its config file and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use acsbridge_api::{TlsMode, TransportConfig};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed NBI endpoints).
    DangerAcceptInvalid,
}

/// How to reach one ACS northbound interface.
#[derive(Debug, Clone)]
pub struct AcsConfig {
    /// NBI base URL (e.g. `http://acs.example.net:7557`).
    pub url: Url,
    /// HTTP basic credentials, when the NBI sits behind a proxy that wants them.
    pub credentials: Option<(String, SecretString)>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How long the ACS may hold a task request open while it runs the
    /// session with the device. `None` lets the ACS decide.
    pub task_wait: Option<Duration>,
}

impl AcsConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credentials: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            task_wait: None,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}

/// Exponential backoff between dispatch attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total dispatch attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before dispatch attempt number `attempt` (0-based).
    ///
    /// Attempt 0 goes out immediately; attempt `n` waits
    /// `initial_delay * multiplier^(n-1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Tuning for the synchronization controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Upper bound on one dispatch call, including any time the ACS holds
    /// the request open.
    pub dispatch_timeout: Duration,
    pub retry: RetryPolicy,
    /// Wait before the first confirmation re-fetch.
    pub confirm_delay: Duration,
    /// Wait between later re-fetches.
    pub confirm_interval: Duration,
    /// Re-fetches before a still-mismatched key counts as drifted.
    pub confirm_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            confirm_delay: Duration::from_secs(2),
            confirm_interval: Duration::from_secs(10),
            confirm_attempts: 6,
        }
    }
}

impl SyncConfig {
    /// Delay before confirmation tick `tick` (0-based).
    pub fn confirm_wait(&self, tick: u32) -> Duration {
        if tick == 0 {
            self.confirm_delay
        } else {
            self.confirm_interval
        }
    }
}
