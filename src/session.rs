//! Account sessions shared by every controller that uses the same account.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use crate::client::DeltaClient;
use crate::config::{ClientConfig, Credentials};
use crate::protocol::ApplianceSnapshot;
use crate::{Error, Result};

/// Poll bookkeeping for one account, guarded by [`AccountSession::lock`].
#[derive(Debug, Default)]
pub struct PollBook {
    /// Last successful list fetch.
    pub last_poll: Option<DateTime<Utc>>,
    /// Last failed list fetch.
    pub fail_time: Option<DateTime<Utc>>,
    pub appliances: Option<Vec<ApplianceSnapshot>>,
}

impl PollBook {
    pub fn in_backoff(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.fail_time
            .is_some_and(|failed| elapsed(failed, now) < window)
    }

    /// Whether the cached list is older than `window` (or missing).
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_poll.is_none_or(|polled| elapsed(polled, now) > window)
    }

    pub fn appliance(&self, appliance_id: &str) -> Option<&ApplianceSnapshot> {
        self.appliances
            .as_ref()?
            .iter()
            .find(|a| a.id == appliance_id)
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

pub struct AccountSession {
    account: String,
    client: DeltaClient,
    book: tokio::sync::Mutex<PollBook>,
}

impl AccountSession {
    pub fn new(client: DeltaClient) -> Self {
        Self {
            account: client.username().to_string(),
            client,
            book: tokio::sync::Mutex::new(PollBook::default()),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn client(&self) -> &DeltaClient {
        &self.client
    }

    /// Exclusive access to the account's poll state. Hold it across any
    /// network call that reads or writes that state.
    pub async fn lock(&self) -> MutexGuard<'_, PollBook> {
        self.book.lock().await
    }

    /// Fetch the appliance list if the cache is stale, recording the outcome.
    /// Callers must have checked the backoff window already.
    pub async fn refresh(
        &self,
        book: &mut PollBook,
        now: DateTime<Utc>,
        refresh_window: Duration,
    ) -> Result<()> {
        if !book.is_stale(now, refresh_window) {
            return Ok(());
        }
        debug!(account = %self.account, "polling account for appliance status");
        match self.client.list_appliances().await {
            Ok(list) => {
                book.last_poll = Some(now);
                book.appliances = Some(list);
                Ok(())
            }
            Err(e) => {
                warn!(account = %self.account, error = %e, "appliance list fetch failed, backing off");
                book.fail_time = Some(now);
                Err(e)
            }
        }
    }
}

/// One session per account, created on first use and kept for the registry's lifetime.
pub struct SessionRegistry {
    config: ClientConfig,
    sessions: Mutex<HashMap<String, Arc<AccountSession>>>,
}

impl SessionRegistry {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the account's session, creating it (without any network call) on first use.
    pub fn get_or_create(&self, credentials: &Credentials) -> Result<Arc<AccountSession>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::Protocol("session registry poisoned".to_string()))?;

        if let Some(session) = sessions.get(&credentials.username) {
            return Ok(Arc::clone(session));
        }

        info!(account = %credentials.username, "creating API session");
        let client = DeltaClient::builder(credentials.clone())
            .with_config(&self.config)
            .build()?;
        let session = Arc::new(AccountSession::new(client));
        sessions.insert(credentials.username.clone(), Arc::clone(&session));
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
