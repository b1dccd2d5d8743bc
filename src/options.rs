use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::WellKnownPaths;
use crate::retry::calculate_retry_delay;

/// Default service location used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Exponential backoff settings shared by the async and blocking clients.
///
/// Fixed once a client is constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single retry delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Scale each delay by a random factor in `[0.5, 1.0)`.
    pub randomize: bool,
    /// Optional bound on the wall-clock time spent across all attempts.
    ///
    /// `None` keeps the per-attempt transport timeout as the only limit.
    pub overall_deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            randomize: true,
            overall_deadline: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = Some(deadline);
        self
    }

    /// Total number of attempts a single logical call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = calculate_retry_delay(
            attempt,
            self.initial_delay.as_secs_f64(),
            self.max_delay.as_secs_f64(),
            self.backoff_factor,
            self.randomize,
        );
        Duration::try_from_secs_f64(secs).unwrap_or_default()
    }
}

/// Construction parameters for [`EvalHubClient`](crate::EvalHubClient) and
/// [`BlockingEvalHubClient`](crate::BlockingEvalHubClient).
#[derive(Clone, PartialEq)]
pub struct ClientOptions {
    /// Service base URL; requests go to `<base_url>/api/v1`.
    pub base_url: String,
    /// Explicit bearer token. Wins over every other token source.
    pub auth_token: Option<String>,
    /// File holding a bearer token.
    pub auth_token_path: Option<PathBuf>,
    /// PEM bundle used to verify the server certificate.
    pub ca_bundle_path: Option<PathBuf>,
    /// Disable TLS verification entirely.
    pub insecure: bool,
    /// Per-request transport timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Locations probed when no explicit token or CA bundle is usable.
    pub well_known: WellKnownPaths,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("auth_token_path", &self.auth_token_path)
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("well_known", &self.well_known)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            auth_token: None,
            auth_token_path: None,
            ca_bundle_path: None,
            insecure: false,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            well_known: WellKnownPaths::default(),
        }
    }
}

impl ClientOptions {
    /// Options for the service at `base_url`, everything else defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_token_path = Some(path.into());
        self
    }

    pub fn with_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle_path = Some(path.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_well_known_paths(mut self, paths: WellKnownPaths) -> Self {
        self.well_known = paths;
        self
    }
}
