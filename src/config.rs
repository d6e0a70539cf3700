use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::logger::MessageLogMode;
use crate::protocol::DEFAULT_BASE_URL;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF_POLL_COUNT: u32 = 15;
const DEFAULT_REFRESH_FACTOR: f64 = 0.5;
const DEFAULT_TRIGGER_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Account credentials. The username doubles as the session key.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-appliance settings persisted by the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplianceConfig {
    #[serde(default)]
    pub appliance_id: Option<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl ApplianceConfig {
    pub fn new(appliance_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            appliance_id: Some(appliance_id.into()),
            credentials: Some(credentials),
        }
    }

    pub(crate) fn appliance_id(&self) -> Option<&str> {
        self.appliance_id.as_deref().filter(|id| !id.is_empty())
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.username.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Intervals to stay quiet after a failed list fetch.
    pub backoff_count: u32,
    /// Fraction of the interval within which a cached list is reused.
    pub refresh_factor: f64,
    /// Delay before the out-of-cycle poll after a command or at start.
    pub trigger_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            backoff_count: DEFAULT_BACKOFF_POLL_COUNT,
            refresh_factor: DEFAULT_REFRESH_FACTOR,
            trigger_delay: DEFAULT_TRIGGER_DELAY,
        }
    }
}

impl PollSettings {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn backoff_count(mut self, count: u32) -> Self {
        self.backoff_count = count;
        self
    }

    pub fn refresh_factor(mut self, factor: f64) -> Self {
        self.refresh_factor = factor;
        self
    }

    pub fn trigger_delay(mut self, delay: Duration) -> Self {
        self.trigger_delay = delay;
        self
    }

    pub(crate) fn backoff_window(&self) -> Duration {
        self.interval * self.backoff_count
    }

    pub(crate) fn refresh_window(&self) -> Duration {
        self.interval.mul_f64(self.refresh_factor)
    }
}

/// Transport settings shared by every session a registry creates.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub message_log: Option<(MessageLogMode, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            message_log: None,
        }
    }
}

impl ClientConfig {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.message_log = Some((mode, path.into()));
        self
    }
}
