//! gcevol Plugin - Docker volume plugin for Compute Engine persistent disks
//!
//! Serves the Docker volume plugin API on a unix socket. Each volume is a
//! persistent disk that is attached to this instance, formatted and mounted
//! under the mount root on demand.

use anyhow::{Context, Result};
use clap::Parser;
use gcevol_core::{DiskProvider, VolumeDriver};
use gcevol_gce::GceProvider;
use gcevol_host::HostFilesystem;
use gcevol_plugin::{LogFormat, PluginConfig, router};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gcevol-plugin")]
#[command(about = "Docker volume plugin for Compute Engine persistent disks")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/gcevol/plugin.toml", env = "GCEVOL_CONFIG")]
    config: PathBuf,

    /// Serve over TCP at this address instead of the unix socket
    #[arg(short, long)]
    listen: Option<String>,

    /// Directory holding the plugin socket
    #[arg(long)]
    socket_dir: Option<PathBuf>,

    /// Directory volumes are mounted under
    #[arg(long)]
    root: Option<PathBuf>,

    /// Compute Engine project (default: from the metadata server)
    #[arg(long)]
    project: Option<String>,

    /// Compute Engine zone (default: from the metadata server)
    #[arg(long)]
    zone: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    fn merge(self, mut config: PluginConfig) -> PluginConfig {
        if let Some(listen) = self.listen {
            config.plugin.listen = Some(listen);
        }
        if let Some(dir) = self.socket_dir {
            config.plugin.socket_dir = dir;
        }
        if let Some(root) = self.root {
            config.volume.root = root;
        }
        if let Some(project) = self.project {
            config.gce.project = project;
        }
        if let Some(zone) = self.zone {
            config.gce.zone = zone;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.log_json {
            config.logging.format = LogFormat::Json;
        }
        config
    }
}

fn init_logging(config: &PluginConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
    info!("Shutting down...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone();
    let config = PluginConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let config = args.merge(config);

    init_logging(&config);

    info!("Starting gcevol volume plugin");
    info!("Config file: {}", config_path.display());
    info!("Mount root: {}", config.volume.root.display());
    info!(
        "Filesystem: {} ({:?}), options {:?}",
        config.volume.fs_type, config.volume.format_policy, config.volume.mount_options
    );

    let provider = GceProvider::discover(config.gce.clone())
        .await
        .context("resolving Compute Engine identity")?;
    info!("Disk provider: {}", provider.name());
    let fs = HostFilesystem::new(config.volume.host_config());
    let driver = VolumeDriver::new(
        config.volume.driver_config(),
        Arc::new(provider),
        Arc::new(fs),
    );
    let app = router(Arc::new(driver));

    if let Some(listen) = &config.plugin.listen {
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("binding {listen}"))?;
        info!("Serving plugin API on {}", listen);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        let socket_path = config.plugin.socket_path();
        std::fs::create_dir_all(&config.plugin.socket_dir)
            .with_context(|| format!("creating {}", config.plugin.socket_dir.display()))?;
        // a socket left behind by an unclean exit blocks bind
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("binding {}", socket_path.display()))?;
        info!("Serving plugin API on {}", socket_path.display());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let _ = std::fs::remove_file(&socket_path);
    }

    info!("Plugin shut down gracefully");
    Ok(())
}
