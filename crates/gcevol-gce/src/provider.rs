//! Compute Engine implementation of [`DiskProvider`]

use crate::auth::{MetadataClient, TokenSource};
use crate::config::GceConfig;
use crate::error::{GceError, GceResult};
use crate::types::{ApiErrorBody, AttachedDisk, DiskList, InsertDisk, Operation};
use async_trait::async_trait;
use gcevol_core::{DiskConfig, DiskProvider, DiskSummary, ProviderError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Persistent-disk provider backed by the Compute Engine API
pub struct GceProvider {
    config: GceConfig,
    http: reqwest::Client,
    tokens: TokenSource,
}

impl GceProvider {
    /// Create a provider for a fully specified project, zone and instance
    pub fn new(config: GceConfig) -> GceResult<Self> {
        if !config.is_resolved() {
            return Err(GceError::Config(
                "project, zone and instance are required".to_string(),
            ));
        }
        let http = build_client(&config)?;
        let tokens = token_source(&config, &http);
        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    /// Create a provider, filling missing identity fields from the metadata server
    pub async fn discover(mut config: GceConfig) -> GceResult<Self> {
        let http = build_client(&config)?;
        let metadata = MetadataClient::new(config.metadata_endpoint.clone(), http.clone());

        if config.project.is_empty() {
            config.project = metadata.project_id().await?;
        }
        if config.zone.is_empty() {
            config.zone = metadata.zone().await?;
        }
        if config.instance.is_empty() {
            config.instance = metadata.instance_name().await?;
        }
        info!(
            project = %config.project,
            zone = %config.zone,
            instance = %config.instance,
            "resolved instance identity"
        );

        let tokens = token_source(&config, &http);
        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    /// Get the resolved configuration
    pub const fn config(&self) -> &GceConfig {
        &self.config
    }

    /// Send an authenticated request, turning non-success replies into errors
    async fn send(&self, request: reqwest::RequestBuilder) -> GceResult<reqwest::Response> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(%status, error = %e, "failed to read error body");
                String::new()
            }
        };
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .map(|b| b.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Compute API returned status {status}: {body}"));
        Err(GceError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Issue a request that returns a zone operation and wait for it
    async fn run_operation(&self, what: &str, request: reqwest::RequestBuilder) -> GceResult<()> {
        debug!(what, "issuing compute request");
        let operation: Operation = self.send(request).await?.json().await?;
        self.wait(what, operation).await
    }

    /// Poll a zone operation until it is done or the wait timeout elapses
    async fn wait(&self, what: &str, mut operation: Operation) -> GceResult<()> {
        let start = Instant::now();
        loop {
            if operation.is_done() {
                return operation
                    .error_message()
                    .map_or(Ok(()), |m| Err(GceError::OperationFailed(m)));
            }

            let waited = start.elapsed();
            if waited >= self.config.wait_timeout() {
                warn!(what, operation = %operation.name, ?waited, "operation wait timed out");
                return Err(GceError::Timeout {
                    operation: what.to_string(),
                    waited,
                });
            }

            debug!(operation = %operation.name, status = ?operation.status, "waiting for operation");
            tokio::time::sleep(self.config.poll_interval()).await;

            let url = format!("{}/operations/{}", self.config.zone_url(), operation.name);
            operation = self.send(self.http.get(&url)).await?.json().await?;
        }
    }

    async fn insert_disk(&self, disk: &DiskConfig) -> GceResult<()> {
        let body = InsertDisk {
            name: disk.name.clone(),
            size_gb: disk.size_gb.filter(|s| *s > 0).map(|s| s.to_string()),
            disk_type: disk.disk_type.as_deref().map(|t| self.config.disk_type(t)),
            source_snapshot: disk
                .source_snapshot
                .as_deref()
                .map(|s| self.config.snapshot(s)),
        };

        let url = format!("{}/disks", self.config.zone_url());
        let mut request = self.http.post(&url).json(&body);
        if let Some(image) = disk.source_image.as_deref() {
            request = request.query(&[("sourceImage", self.config.image(image))]);
        }
        self.run_operation(&format!("create disk {}", disk.name), request)
            .await
    }

    async fn list_disks(&self) -> GceResult<Vec<DiskSummary>> {
        let url = format!("{}/disks", self.config.zone_url());
        let mut disks = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: DiskList = self.send(request).await?.json().await?;
            disks.extend(
                page.items
                    .into_iter()
                    .map(|d| DiskSummary::new(d.name, d.status)),
            );

            match page.next_page_token {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(page_token = %token, "list returned the same page token twice");
                    break;
                }
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = disks.len(), "listed disks");
        Ok(disks)
    }

    async fn attach_disk(&self, disk: &DiskConfig) -> GceResult<()> {
        let body = AttachedDisk {
            source: self.config.disk_source(&disk.name),
            device_name: disk.name.clone(),
            mode: "READ_WRITE".to_string(),
            auto_delete: false,
            boot: false,
        };
        let url = format!(
            "{}/instances/{}/attachDisk",
            self.config.zone_url(),
            self.config.instance
        );
        self.run_operation(
            &format!("attach disk {}", disk.name),
            self.http.post(&url).json(&body),
        )
        .await
    }

    async fn detach_disk(&self, disk: &DiskConfig) -> GceResult<()> {
        let url = format!(
            "{}/instances/{}/detachDisk",
            self.config.zone_url(),
            self.config.instance
        );
        let request = self
            .http
            .post(&url)
            .query(&[("deviceName", disk.name.as_str())]);
        self.run_operation(&format!("detach disk {}", disk.name), request)
            .await
    }

    async fn delete_disk(&self, disk: &DiskConfig) -> GceResult<()> {
        let url = format!("{}/disks/{}", self.config.zone_url(), disk.name);
        self.run_operation(&format!("delete disk {}", disk.name), self.http.delete(&url))
            .await
    }
}

fn build_client(config: &GceConfig) -> GceResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| GceError::Config(e.to_string()))
}

fn token_source(config: &GceConfig, http: &reqwest::Client) -> TokenSource {
    match &config.access_token {
        Some(token) if !token.is_empty() => TokenSource::Static(token.clone()),
        _ => TokenSource::metadata(MetadataClient::new(
            config.metadata_endpoint.clone(),
            http.clone(),
        )),
    }
}

#[async_trait]
impl DiskProvider for GceProvider {
    fn name(&self) -> &str {
        "gce"
    }

    async fn create(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        Ok(self.insert_disk(config).await?)
    }

    async fn list(&self) -> Result<Vec<DiskSummary>, ProviderError> {
        Ok(self.list_disks().await?)
    }

    async fn attach(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        Ok(self.attach_disk(config).await?)
    }

    async fn detach(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        Ok(self.detach_disk(config).await?)
    }

    async fn delete(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        Ok(self.delete_disk(config).await?)
    }
}
