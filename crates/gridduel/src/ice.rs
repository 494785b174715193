//! ICE server (STUN/TURN) credentials for the transport.
//!
//! Credentials come from an HTTP endpoint returning `{"iceServers": [...]}`.
//! Any failure degrades to an empty list: the transport then connects with
//! whatever it can reach without a relay.

use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// One STUN or TURN server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URL or URLs.
    pub urls: IceUrls,
    /// TURN username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// TURN credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// A single URL or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IceUrls {
    /// One URL.
    One(String),
    /// Several URLs.
    Many(Vec<String>),
}

impl IceUrls {
    /// Every URL in the entry.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            IceUrls::One(url) => vec![url.clone()],
            IceUrls::Many(urls) => urls.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IceResponse {
    #[serde(default)]
    ice_servers: Vec<IceServer>,
}

/// Source of ICE servers.
#[async_trait]
pub trait IceProvider: Send + Sync {
    /// Current servers; empty when none are available.
    async fn ice_servers(&self) -> Vec<IceServer>;
}

/// Fetches credentials over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIceProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpIceProvider {
    /// Creates a provider for `endpoint`.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { endpoint, client }
    }

    async fn fetch(&self) -> Result<Vec<IceServer>, reqwest::Error> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;
        let body: IceResponse = response.json().await?;
        Ok(body.ice_servers)
    }
}

#[async_trait]
impl IceProvider for HttpIceProvider {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn ice_servers(&self) -> Vec<IceServer> {
        match self.fetch().await {
            Ok(servers) => {
                info!(count = servers.len(), "Fetched ICE servers");
                servers
            }
            Err(err) => {
                warn!(error = %err, "ICE fetch failed; continuing without relay");
                Vec::new()
            }
        }
    }
}

/// Fixed list, e.g. public STUN servers from configuration.
#[derive(Debug, Clone, Default, new)]
pub struct StaticIceProvider {
    servers: Vec<IceServer>,
}

#[async_trait]
impl IceProvider for StaticIceProvider {
    async fn ice_servers(&self) -> Vec<IceServer> {
        debug!(count = self.servers.len(), "Static ICE servers");
        self.servers.clone()
    }
}
