use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::storage::config::RemoteConfig;

/// Whole collection as delivered by the realtime store: `id -> raw record`.
pub type Snapshot = serde_json::Map<String, serde_json::Value>;
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Snapshot>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Minimal capability of a hosted realtime collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Current contents of the collection. An empty collection is an empty map.
    async fn fetch(&self) -> Result<Snapshot, TransportError>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), TransportError>;

    async fn remove(&self, key: &str) -> Result<(), TransportError>;

    /// Starts delivering a snapshot on every change of the collection.
    fn watch(&self) -> SnapshotReceiver;
}

/// Realtime Database REST client: `{url}/{collection}/{key}.json`.
#[derive(Clone)]
pub struct RestTransport {
    base_url: String,
    collection: String,
    auth_token: Option<String>,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl RestTransport {
    pub fn new(config: &RemoteConfig) -> Result<Self, TransportError> {
        let base_url = config.database_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            base_url,
            collection: config.collection.trim_matches('/').to_string(),
            auth_token: config.auth_token.clone().filter(|token| !token.is_empty()),
            poll_interval: Duration::from_secs(config.poll_interval_seconds.max(1)),
            client: reqwest::Client::new(),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.collection)
    }

    fn record_url(&self, key: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, self.collection, urlencoding::encode(key))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        tracing::debug!("{} response status: {}", action, status);

        if status == 401 || status == 403 {
            tracing::error!("Authentication failed on {}", action);
            return Err(TransportError::AuthenticationFailed);
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("{} failed. Status: {}, Body: {}", action, status, body);
            return Err(TransportError::RequestError(format!("Status {}: {}", status, body)));
        }

        Ok(response)
    }
}

#[async_trait]
impl RealtimeTransport for RestTransport {
    async fn fetch(&self) -> Result<Snapshot, TransportError> {
        let response = self
            .authorize(self.client.get(self.collection_url()))
            .send()
            .await?;
        let response = Self::check(response, "fetch").await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::ParseError(e.to_string()))?;

        match body {
            serde_json::Value::Null => Ok(Snapshot::new()),
            serde_json::Value::Object(map) => Ok(map),
            other => Err(TransportError::ParseError(format!(
                "expected an object at {}, got {}",
                self.collection, other
            ))),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), TransportError> {
        tracing::debug!("PUT {} with payload: {}", self.record_url(key), value);
        let response = self
            .authorize(self.client.put(self.record_url(key)))
            .json(&value)
            .send()
            .await?;
        Self::check(response, "set").await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), TransportError> {
        let response = self
            .authorize(self.client.delete(self.record_url(key)))
            .send()
            .await?;
        Self::check(response, "remove").await?;
        Ok(())
    }

    /// Polls the collection and forwards it whenever it differs from the last
    /// delivered snapshot. The first successful fetch is always delivered.
    /// Polling stops once the receiver is dropped.
    fn watch(&self) -> SnapshotReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = self.clone();

        tokio::spawn(async move {
            let mut last: Option<Snapshot> = None;
            loop {
                match transport.fetch().await {
                    Ok(snapshot) if last.as_ref() != Some(&snapshot) => {
                        if tx.send(snapshot.clone()).is_err() {
                            break;
                        }
                        last = Some(snapshot);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Polling {} failed: {}", transport.collection, e),
                }

                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(transport.poll_interval).await;
            }
            tracing::debug!("Stopped watching {}", transport.collection);
        });

        rx
    }
}
