//! Docker volume plugin endpoints
//!
//! Every endpoint answers 200 with a JSON body; failures travel in the
//! `Err` field, including bodies that fail to parse.

use crate::locks::NameLocks;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use gcevol_core::{ActivateResponse, Request, Response as PluginResponse, VolumeDriver};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Media type of plugin API requests and replies
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    driver: Arc<VolumeDriver>,
    locks: NameLocks,
}

/// Build the plugin API router
pub fn router(driver: Arc<VolumeDriver>) -> Router {
    let state = AppState {
        driver,
        locks: NameLocks::new(),
    };

    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON body sent with the plugin media type
struct PluginJson<T>(T);

impl<T: Serialize> IntoResponse for PluginJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => ([(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], body).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Create,
    Remove,
    Mount,
    Unmount,
    Path,
    Get,
    List,
    Capabilities,
}

impl Operation {
    /// Whether concurrent calls for one name must be ordered
    const fn is_exclusive(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Remove | Self::Mount | Self::Unmount | Self::Path
        )
    }
}

/// Decode a request body; an empty body is an empty request
fn parse(body: &[u8]) -> Result<Request, PluginResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Request::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "malformed plugin request");
        PluginResponse::error(format!("invalid request body: {e}"))
    })
}

async fn dispatch(state: &AppState, op: Operation, body: &[u8]) -> PluginJson<PluginResponse> {
    let req = match parse(body) {
        Ok(req) => req,
        Err(resp) => return PluginJson(resp),
    };

    let _guard = if op.is_exclusive() {
        Some(state.locks.lock(req.disk_name()).await)
    } else {
        None
    };

    let driver = &state.driver;
    let resp = match op {
        Operation::Create => driver.create(&req).await,
        Operation::Remove => driver.remove(&req).await,
        Operation::Mount => driver.mount(&req).await,
        Operation::Unmount => driver.unmount(&req).await,
        Operation::Path => driver.path(&req).await,
        Operation::Get => driver.get(&req).await,
        Operation::List => driver.list(&req).await,
        Operation::Capabilities => driver.capabilities(&req),
    };
    PluginJson(resp)
}

async fn activate() -> PluginJson<ActivateResponse> {
    PluginJson(ActivateResponse::default())
}

async fn create(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Create, &body).await
}

async fn remove(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Remove, &body).await
}

async fn mount(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Mount, &body).await
}

async fn unmount(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Unmount, &body).await
}

async fn path(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Path, &body).await
}

async fn get(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Get, &body).await
}

async fn list(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::List, &body).await
}

async fn capabilities(State(state): State<AppState>, body: Bytes) -> PluginJson<PluginResponse> {
    dispatch(&state, Operation::Capabilities, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use gcevol_core::{
        DiskConfig, DiskProvider, DiskStatus, DiskSummary, ProviderError, VolumeDriverConfig,
    };
    use gcevol_host::{HostConfig, HostFilesystem};
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    /// In-memory disk inventory
    #[derive(Default)]
    struct MemoryProvider {
        disks: Mutex<Vec<DiskSummary>>,
        /// Creates currently running, and the most seen at once
        creating: AtomicUsize,
        peak_creating: AtomicUsize,
        create_delay: Option<Duration>,
    }

    #[async_trait]
    impl DiskProvider for MemoryProvider {
        fn name(&self) -> &str {
            "memory"
        }

        async fn create(&self, config: &DiskConfig) -> Result<(), ProviderError> {
            let running = self.creating.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_creating.fetch_max(running, Ordering::SeqCst);
            if let Some(delay) = self.create_delay {
                tokio::time::sleep(delay).await;
            }
            self.creating.fetch_sub(1, Ordering::SeqCst);

            let mut disks = self.disks.lock();
            if disks.iter().any(|d| d.name == config.name) {
                return Err(ProviderError::remote(format!(
                    "The resource '{}' already exists",
                    config.name
                )));
            }
            disks.push(DiskSummary::new(config.name.clone(), DiskStatus::Ready));
            Ok(())
        }

        async fn list(&self) -> Result<Vec<DiskSummary>, ProviderError> {
            Ok(self.disks.lock().clone())
        }

        async fn attach(&self, _config: &DiskConfig) -> Result<(), ProviderError> {
            Err(ProviderError::remote("attach unavailable"))
        }

        async fn detach(&self, _config: &DiskConfig) -> Result<(), ProviderError> {
            Err(ProviderError::remote("detach unavailable"))
        }

        async fn delete(&self, config: &DiskConfig) -> Result<(), ProviderError> {
            let mut disks = self.disks.lock();
            let before = disks.len();
            disks.retain(|d| d.name != config.name);
            if disks.len() == before {
                return Err(ProviderError::remote(format!(
                    "The resource '{}' was not found",
                    config.name
                )));
            }
            Ok(())
        }
    }

    fn app() -> (Router, TempDir) {
        app_with(Arc::new(MemoryProvider::default()))
    }

    fn app_with(provider: Arc<MemoryProvider>) -> (Router, TempDir) {
        let root = tempdir().unwrap();
        let driver = VolumeDriver::new(
            VolumeDriverConfig {
                root: root.path().to_path_buf(),
                ..VolumeDriverConfig::default()
            },
            provider,
            Arc::new(HostFilesystem::new(HostConfig::default())),
        );
        (router(Arc::new(driver)), root)
    }

    async fn call(app: &Router, uri: &str, body: &str) -> (StatusCode, Option<String>, PluginResponse) {
        let req = HttpRequest::post(uri)
            .header(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let parsed = serde_json::from_slice(&bytes).unwrap_or_default();
        (status, content_type, parsed)
    }

    #[tokio::test]
    async fn test_activate() {
        let (app, _root) = app();
        let req = HttpRequest::post("/Plugin.Activate").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"Implements":["VolumeDriver"]}"#);
    }

    #[tokio::test]
    async fn test_create_get_list_remove() {
        let (app, root) = app();

        let (status, content_type, resp) =
            call(&app, "/VolumeDriver.Create", r#"{"Name":"data1","Opts":{"SizeGb":"10"}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(PLUGIN_CONTENT_TYPE));
        assert!(resp.is_ok(), "{resp:?}");

        let (_, _, resp) = call(&app, "/VolumeDriver.Get", r#"{"Name":"data1"}"#).await;
        let volume = resp.volume.unwrap();
        assert_eq!(volume.name, "data1");
        let expected = root.path().join("data1");
        assert_eq!(volume.mountpoint.as_deref().map(Path::new), Some(expected.as_path()));

        let (_, _, resp) = call(&app, "/VolumeDriver.List", "").await;
        assert_eq!(resp.volumes.len(), 1);

        let (_, _, resp) = call(&app, "/VolumeDriver.Remove", r#"{"Name":"data1"}"#).await;
        assert!(resp.is_ok());

        let (_, _, resp) = call(&app, "/VolumeDriver.Get", r#"{"Name":"data1"}"#).await;
        assert_eq!(resp, PluginResponse::default());
    }

    #[tokio::test]
    async fn test_errors_travel_in_body() {
        let (app, _root) = app();

        let (status, _, resp) =
            call(&app, "/VolumeDriver.Create", r#"{"Name":"data1","Opts":{"Size":"10"}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.err.as_deref(), Some(r#"unknown option "Size""#));

        let (status, _, resp) = call(&app, "/VolumeDriver.Remove", r#"{"Name":"ghost"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.err.as_deref(), Some("The resource 'ghost' was not found"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (app, _root) = app();
        let (status, _, resp) = call(&app, "/VolumeDriver.Mount", "{not json").await;

        assert_eq!(status, StatusCode::OK);
        assert!(resp.err.unwrap().starts_with("invalid request body"));
        assert!(resp.mountpoint.is_none());
    }

    #[tokio::test]
    async fn test_path_and_capabilities() {
        let (app, root) = app();

        let (_, _, resp) = call(&app, "/VolumeDriver.Path", r#"{"Name":"data1"}"#).await;
        assert!(resp.is_ok());
        assert!(root.path().join("data1").is_dir());

        let (_, _, resp) = call(&app, "/VolumeDriver.Capabilities", "").await;
        let body = serde_json::to_string(&resp).unwrap();
        assert_eq!(body, r#"{"Capabilities":{"Scope":"local"}}"#);
    }

    #[tokio::test]
    async fn test_volumes_sharing_a_disk_are_serialized() {
        let provider = Arc::new(MemoryProvider {
            create_delay: Some(Duration::from_millis(50)),
            ..MemoryProvider::default()
        });
        let (app, _root) = app_with(Arc::clone(&provider));

        let (first, second) = tokio::join!(
            call(&app, "/VolumeDriver.Create", r#"{"Name":"vol-a","Opts":{"Name":"shared"}}"#),
            call(&app, "/VolumeDriver.Create", r#"{"Name":"vol-b","Opts":{"Name":"shared"}}"#),
        );

        assert_eq!(provider.peak_creating.load(Ordering::SeqCst), 1);
        let oks = [first.2.is_ok(), second.2.is_ok()];
        assert_eq!(oks.iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_disks_run_concurrently() {
        let provider = Arc::new(MemoryProvider {
            create_delay: Some(Duration::from_millis(50)),
            ..MemoryProvider::default()
        });
        let (app, _root) = app_with(Arc::clone(&provider));

        let (first, second) = tokio::join!(
            call(&app, "/VolumeDriver.Create", r#"{"Name":"vol-a"}"#),
            call(&app, "/VolumeDriver.Create", r#"{"Name":"vol-b"}"#),
        );

        assert!(first.2.is_ok() && second.2.is_ok());
        assert_eq!(provider.peak_creating.load(Ordering::SeqCst), 2);
    }
}
