//! Access tokens and instance identity from the metadata server

use crate::error::{GceError, GceResult};
use crate::types::AccessToken;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Client for the in-instance metadata server
#[derive(Debug, Clone)]
pub struct MetadataClient {
    endpoint: String,
    http: reqwest::Client,
}

impl MetadataClient {
    pub fn new(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn get(&self, path: &str) -> GceResult<reqwest::Response> {
        let url = format!("{}/{}", self.endpoint, path);
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| GceError::Metadata(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(GceError::Metadata(format!(
                "GET {url} returned status {}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn get_text(&self, path: &str) -> GceResult<String> {
        let text = self
            .get(path)
            .await?
            .text()
            .await
            .map_err(|e| GceError::Metadata(e.to_string()))?;
        Ok(text.trim().to_string())
    }

    /// Project this instance runs in
    pub async fn project_id(&self) -> GceResult<String> {
        self.get_text("project/project-id").await
    }

    /// Zone of this instance (short name)
    pub async fn zone(&self) -> GceResult<String> {
        // Reported as projects/<number>/zones/<zone>
        let zone = self.get_text("instance/zone").await?;
        Ok(zone.rsplit('/').next().unwrap_or_default().to_string())
    }

    /// Name of this instance
    pub async fn instance_name(&self) -> GceResult<String> {
        self.get_text("instance/name").await
    }

    /// Access token of the default service account
    pub async fn access_token(&self) -> GceResult<AccessToken> {
        self.get("instance/service-accounts/default/token")
            .await?
            .json()
            .await
            .map_err(|e| GceError::Metadata(format!("invalid token reply: {e}")))
    }
}

/// Token held by [`TokenSource::Metadata`]
#[derive(Debug)]
pub struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Where API access tokens come from
#[derive(Debug)]
pub enum TokenSource {
    /// A fixed token, typically for testing or an external refresher
    Static(String),
    /// Default service account token from the metadata server, cached until
    /// shortly before expiry
    Metadata {
        client: MetadataClient,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    pub fn metadata(client: MetadataClient) -> Self {
        Self::Metadata {
            client,
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token
    pub async fn token(&self) -> GceResult<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata { client, cached } => {
                if let Some(entry) = cached.lock().as_ref() {
                    if Instant::now() < entry.refresh_at {
                        return Ok(entry.token.clone());
                    }
                }

                debug!("fetching access token from metadata server");
                let fresh = client.access_token().await?;
                let lifetime = Duration::from_secs(fresh.expires_in)
                    .saturating_sub(TOKEN_REFRESH_MARGIN);
                *cached.lock() = Some(CachedToken {
                    token: fresh.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(fresh.access_token)
            }
        }
    }
}
