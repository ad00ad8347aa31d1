use crate::errors::TrackerError;
use crate::models::PlayerSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use std::{sync::Arc, time::Duration};

/// Anything the poller can pull a [`PlayerSnapshot`] from.
#[async_trait]
pub trait PlayerSource: Send + Sync {
    async fn fetch(&self) -> Result<PlayerSnapshot, TrackerError>;
}

#[async_trait]
impl<T: PlayerSource + ?Sized> PlayerSource for Arc<T> {
    async fn fetch(&self) -> Result<PlayerSnapshot, TrackerError> {
        (**self).fetch().await
    }
}

/// Client for the game's local telemetry endpoint. No retries: the poller's
/// interval is the retry.
pub struct EndpointClient {
    http: Client,
    url: String,
}

impl EndpointClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TrackerError::Transport)?;
        Ok(Self { http, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PlayerSource for EndpointClient {
    async fn fetch(&self) -> Result<PlayerSnapshot, TrackerError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(TrackerError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Protocol(format!("{} returned {status}", self.url)));
        }

        let body = response.bytes().await.map_err(TrackerError::Transport)?;
        serde_json::from_slice(&body)
            .map_err(|err| TrackerError::Protocol(format!("malformed body from {}: {err}", self.url)))
    }
}
