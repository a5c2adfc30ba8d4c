// # managed-dnsd
//
// Thin daemon around `managed-dns-core`: it reads its settings, registers
// the backends compiled in, provisions the supervisor and runs it until
// SIGTERM/SIGINT. All DNS logic lives in the core crate.
//
// ## Configuration
//
// - `MANAGED_DNS_CONFIG`: Path to the JSON configuration (required)
// - `MANAGED_DNS_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
//
// ## Example
//
// ```bash
// cat > /etc/managed-dns/config.json <<'JSON'
// {
//   "dns_provider": { "type": "cloudflare", "api_token": "..." },
//   "records": [{ "hostname": "home.example.com" }]
// }
// JSON
//
// export MANAGED_DNS_CONFIG=/etc/managed-dns/config.json
// managed-dnsd
// ```

mod config;

use anyhow::Result;
use config::DaemonConfig;
use managed_dns_core::{AppConfig, Error, Registry, Supervisor, WatcherEvent};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error, including watchers that did not stop in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let daemon_config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(daemon_config.level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting managed-dnsd");

    let app_config = match config::load_app_config(&daemon_config.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!("Configuration loaded: {} record(s)", app_config.records.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(app_config)).into()
}

/// Build the registry from the backends compiled into this binary
fn build_registry() -> Registry {
    #[allow(unused_mut)]
    let mut registry = Registry::with_builtins();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP value source");
        managed_dns_ip_http::register(&mut registry);
    }

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        managed_dns_provider_cloudflare::register(&mut registry);
    }

    registry
}

/// Run the daemon
async fn run_daemon(app_config: AppConfig) -> DaemonExitCode {
    let registry = build_registry();

    let (mut supervisor, events) = match Supervisor::provision(&app_config, &registry) {
        Ok(provisioned) => provisioned,
        Err(e) => {
            error!("Provisioning failed: {}", e);
            return DaemonExitCode::ConfigError;
        }
    };

    let report = match supervisor.start() {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to start watchers: {}", e);
            return DaemonExitCode::RuntimeError;
        }
    };

    for (hostname, e) in &report.failed {
        warn!("Record {} was not started: {}", hostname, e);
    }

    if report.started.is_empty() {
        error!("No record could be started");
        return DaemonExitCode::ConfigError;
    }

    let event_logger = tokio::spawn(log_events(events));

    match wait_for_shutdown().await {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => error!("Signal handling failed, shutting down: {}", e),
    }

    match supervisor.stop().await {
        Ok(report) => {
            for summary in &report.stopped {
                info!(
                    "Stopped {} ({} record type(s) published)",
                    summary.hostname,
                    summary.published.len()
                );
            }

            // The channel closes once every watcher is gone
            let _ = event_logger.await;

            if report.crashed.is_empty() {
                info!("Shutdown complete");
                DaemonExitCode::CleanShutdown
            } else {
                error!("Watchers terminated abnormally: {}", report.crashed.join(", "));
                DaemonExitCode::RuntimeError
            }
        }
        Err(e @ Error::ShutdownTimeout { .. }) => {
            error!("{}", e);
            DaemonExitCode::RuntimeError
        }
        Err(e) => {
            error!("Shutdown error: {}", e);
            DaemonExitCode::RuntimeError
        }
    }
}

/// Log watcher events until every sender is gone
async fn log_events(mut events: mpsc::Receiver<WatcherEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WatcherEvent::Published {
                hostname,
                record_type,
                value,
                previous,
            } => info!(
                "Event: {} {} published {} (previous: {:?})",
                hostname, record_type, value, previous
            ),
            WatcherEvent::PublishFailed {
                hostname,
                record_type,
                error,
                ..
            } => warn!("Event: {} {} publish failed: {}", hostname, record_type, error),
            other => debug!("Event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// The name of the signal received
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
