use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::{ClientConfig, Credentials};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    ApplianceSnapshot, DEFAULT_BASE_URL, LoginRequest, LoginResponse, PropertyPatch,
};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DeltaClientBuilder {
    credentials: Credentials,
    base_url: String,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl DeltaClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Upper bound for every request, login included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub(crate) fn with_config(mut self, config: &ClientConfig) -> Self {
        self = self.base_url(config.base_url.clone()).timeout(config.request_timeout);
        if let Some((mode, path)) = &config.message_log {
            self = self.message_log(*mode, path.clone());
        }
        self
    }

    pub fn build(self) -> Result<DeltaClient> {
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        let client_id = Uuid::new_v4();

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path, client_id)?)),
            _ => None,
        };

        Ok(DeltaClient {
            http,
            base_url: self.base_url,
            credentials: self.credentials,
            client_id,
            token: tokio::sync::Mutex::new(None),
            logger,
        })
    }
}

/// Authenticated client for one cloud account.
pub struct DeltaClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    client_id: Uuid,
    token: tokio::sync::Mutex<Option<String>>,
    logger: Option<Mutex<MessageLogger>>,
}

impl DeltaClient {
    pub fn builder(credentials: Credentials) -> DeltaClientBuilder {
        DeltaClientBuilder::new(credentials)
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Exchange the account credentials for a bearer token.
    pub async fn login(&self) -> Result<String> {
        let url = format!("{}/Users/Login", self.base_url);
        debug!(account = %self.credentials.username, "logging in");
        self.log(|l| l.log_request("POST", "/Users/Login"));

        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest {
                username: &self.credentials.username,
                password: &self.credentials.password,
            })
            .send()
            .await?;

        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(Error::Auth(format!("login rejected ({})", resp.status())));
        }

        let body: LoginResponse = resp.error_for_status()?.json().await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("login response carried no access token".to_string()))
    }

    /// Fetch every appliance on the account, twin included.
    pub async fn list_appliances(&self) -> Result<Vec<ApplianceSnapshot>> {
        let path = "/Domains/Appliances";
        let resp = self.send_authorized(Method::GET, path, None).await?;
        let status = resp.status().as_u16();
        let body: Value = resp.error_for_status()?.json().await?;

        if self.logger.is_some() {
            let keyed = keyed_by_appliance(&body);
            self.log(|l| l.log_list(status, &keyed));
        }

        let appliances: Vec<ApplianceSnapshot> = serde_json::from_value(body)
            .map_err(|e| Error::Protocol(format!("appliance list: {e}")))?;
        trace!(count = appliances.len(), "fetched appliance list");
        Ok(appliances)
    }

    /// Fetch one appliance. `None` when the account does not have it.
    pub async fn get_appliance(&self, appliance_id: &str) -> Result<Option<ApplianceSnapshot>> {
        let path = format!("/Appliances/{appliance_id}");
        let resp = self.send_authorized(Method::GET, &path, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = resp.error_for_status()?.json().await?;
        let appliance = serde_json::from_value(body)
            .map_err(|e| Error::Protocol(format!("appliance {appliance_id}: {e}")))?;
        Ok(Some(appliance))
    }

    /// Merge `patch` into the appliance's desired properties.
    pub async fn send_command(&self, appliance_id: &str, patch: &PropertyPatch) -> Result<()> {
        let path = format!("/Appliances/{appliance_id}/Commands");
        let body = patch.to_value();
        debug!(appliance = %appliance_id, patch = %body, "sending command");
        self.log(|l| l.log_command(appliance_id, &body));

        self.send_authorized(Method::PUT, &path, Some(&body))
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_authorized(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let token = self.token().await?;
        let resp = self.request(method.clone(), path, body, &token).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(account = %self.credentials.username, "token rejected, logging in again");
        let token = self.refresh_token(&token).await?;
        Ok(self.request(method, path, body, &token).send().await?)
    }

    fn request(&self, method: Method, path: &str, body: Option<&Value>, token: &str) -> RequestBuilder {
        self.log(|l| l.log_request(method.as_str(), path));
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        match body {
            Some(b) => builder.json(b),
            None => builder,
        }
    }

    async fn token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Replace `stale` with a fresh token unless another caller already did.
    async fn refresh_token(&self, stale: &str) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(current) = guard.as_ref()
            && current != stale
        {
            return Ok(current.clone());
        }
        *guard = None;
        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            f(&mut *logger);
        }
    }
}

/// Re-key the list by appliance id so the diffed message log can compare entries.
fn keyed_by_appliance(body: &Value) -> Value {
    let Value::Array(items) = body else {
        return body.clone();
    };
    let mut map = Map::new();
    for (idx, item) in items.iter().enumerate() {
        let key = item
            .get("pncId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| idx.to_string());
        map.insert(key, item.clone());
    }
    Value::Object(map)
}
