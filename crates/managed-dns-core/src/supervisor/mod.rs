//! Supervisor for a set of watcher loops
//!
//! The Supervisor is responsible for:
//! - Provisioning records from an [`AppConfig`] through a [`Registry`]
//! - Starting one [`WatcherLoop`] per record
//! - Broadcasting the shutdown signal and waiting for every loop to stop
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!                       │  Supervisor  │── shutdown (watch) ──┐
//!                       └──────────────┘                      │
//!                               │ spawn                       │
//!         ┌─────────────────────┼─────────────────────┐       │
//!         ▼                     ▼                     ▼       │
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐  │
//! │ WatcherLoop  │     │ WatcherLoop  │     │ WatcherLoop  │◀─┘
//! │  (record a)  │     │  (record b)  │     │  (record c)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!         │                     │                     │
//!         └──────────── WatcherEvent (mpsc) ──────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. [`Supervisor::provision`] (or [`Supervisor::new`] with prebuilt records)
//! 2. [`Supervisor::start`]: invalid records are reported, the rest run
//! 3. [`Supervisor::stop`]: signal, wait up to the grace period, report
//!
//! Loops that outlive the grace period are reported in
//! [`Error::ShutdownTimeout`] and left running; they are never aborted.

use crate::config::{AppConfig, SupervisorConfig};
use crate::error::{Error, Result};
use crate::record::{Record, RecordSummary, deadline_after};
use crate::registry::Registry;
use crate::watcher::{WatcherEvent, WatcherLoop, WatcherState, WatcherTimeouts};
use std::collections::HashSet;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Records that started and records rejected at start
#[derive(Debug, Default)]
pub struct StartReport {
    /// Hostnames whose loops are running
    pub started: Vec<String>,
    /// Hostnames that failed validation, with the reason
    pub failed: Vec<(String, Error)>,
}

impl StartReport {
    /// Whether every record started
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a clean stop
#[derive(Debug, Default)]
pub struct StopReport {
    /// Final summaries of the loops that stopped
    pub stopped: Vec<RecordSummary>,
    /// Hostnames whose loop panicked instead of stopping
    pub crashed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Provisioned,
    Running,
    Stopped,
}

struct RunningLoop {
    hostname: String,
    state: watch::Receiver<WatcherState>,
    handle: JoinHandle<RecordSummary>,
}

/// Owner of all watcher loops
pub struct Supervisor {
    pending: Vec<Record>,
    running: Vec<RunningLoop>,
    config: SupervisorConfig,
    shutdown_tx: watch::Sender<bool>,
    // Dropped on stop so the event receiver closes once every loop is gone
    event_tx: Option<mpsc::Sender<WatcherEvent>>,
    phase: Phase,
}

impl Supervisor {
    /// Create a supervisor for prebuilt records
    ///
    /// # Returns
    ///
    /// A tuple of (supervisor, event_receiver) where event_receiver yields
    /// the events of every loop
    pub fn new(
        records: Vec<Record>,
        config: SupervisorConfig,
    ) -> (Self, mpsc::Receiver<WatcherEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        let supervisor = Self {
            pending: records,
            running: Vec::new(),
            config,
            shutdown_tx,
            event_tx: Some(event_tx),
            phase: Phase::Provisioned,
        };

        (supervisor, event_rx)
    }

    /// Build every record of `config` through `registry`
    ///
    /// Provisioning is all or nothing: the first configuration error is
    /// returned and no supervisor is created.
    pub fn provision(
        config: &AppConfig,
        registry: &Registry,
    ) -> Result<(Self, mpsc::Receiver<WatcherEvent>)> {
        config.validate()?;

        let mut seen = HashSet::new();
        for managed in &config.records {
            if !seen.insert(managed.hostname.to_ascii_lowercase()) {
                return Err(Error::config(format!(
                    "duplicate record: {}",
                    managed.hostname
                )));
            }
        }

        let mut records = Vec::with_capacity(config.records.len());
        for managed in &config.records {
            let record_config = managed.resolve(config)?;

            let provider_config = managed.effective_provider(config)?;
            provider_config.validate()?;
            let provider = registry.create_provider(provider_config)?;

            let mut sources = Vec::new();
            for source_config in managed.effective_sources() {
                source_config.validate()?;
                sources.push(registry.create_source(&source_config)?);
            }

            records.push(Record::new(record_config, sources, provider));
        }

        info!("Provisioned {} record(s)", records.len());
        Ok(Self::new(records, config.supervisor.clone()))
    }

    /// Spawn a watcher loop for every valid record
    ///
    /// Invalid records are logged and reported; they do not prevent the
    /// others from starting. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when called more than once or after [`stop`](Self::stop).
    pub fn start(&mut self) -> Result<StartReport> {
        let event_tx = match (&self.event_tx, self.phase) {
            (Some(event_tx), Phase::Provisioned) => event_tx.clone(),
            _ => return Err(Error::config("supervisor already started")),
        };
        self.phase = Phase::Running;

        let timeouts = WatcherTimeouts {
            fetch: self.config.fetch_timeout(),
            provider: self.config.provider_timeout(),
        };

        let mut report = StartReport::default();

        for record in std::mem::take(&mut self.pending) {
            let hostname = record.hostname().to_string();

            if let Err(e) = record.validate() {
                error!("Not starting {}: {}", hostname, e);
                report.failed.push((hostname, e));
                continue;
            }

            let (watcher, state) = WatcherLoop::new(
                record,
                timeouts,
                self.shutdown_tx.subscribe(),
                event_tx.clone(),
            );
            let handle = tokio::spawn(watcher.run());

            self.running.push(RunningLoop {
                hostname: hostname.clone(),
                state,
                handle,
            });
            report.started.push(hostname);
        }

        info!(
            "Started {} watcher(s), {} failed",
            report.started.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Signal every loop to stop and wait for them
    ///
    /// Waits at most the configured shutdown timeout in total. Calling
    /// `stop` again afterwards is a no-op returning an empty report.
    ///
    /// # Errors
    ///
    /// [`Error::ShutdownTimeout`] naming the loops still running at the
    /// deadline. Summaries of the loops that did stop are logged.
    pub async fn stop(&mut self) -> Result<StopReport> {
        if self.phase == Phase::Stopped {
            return Ok(StopReport::default());
        }
        self.phase = Phase::Stopped;
        self.pending.clear();
        self.event_tx = None;

        info!("Stopping {} watcher(s)", self.running.len());
        self.shutdown_tx.send_replace(true);

        let deadline = deadline_after(self.config.shutdown_timeout());
        let mut report = StopReport::default();
        let mut timed_out = Vec::new();

        for running in std::mem::take(&mut self.running) {
            match tokio::time::timeout_at(deadline, running.handle).await {
                Ok(Ok(summary)) => report.stopped.push(summary),
                Ok(Err(e)) => {
                    error!("Watcher for {} terminated abnormally: {}", running.hostname, e);
                    report.crashed.push(running.hostname);
                }
                Err(_) => {
                    warn!(
                        "Watcher for {} did not stop in time (state: {:?})",
                        running.hostname,
                        *running.state.borrow()
                    );
                    timed_out.push(running.hostname);
                }
            }
        }

        if !timed_out.is_empty() {
            for summary in &report.stopped {
                info!("Stopped {} ({} published)", summary.hostname, summary.published.len());
            }
            return Err(Error::ShutdownTimeout { records: timed_out });
        }

        info!("All watchers stopped");
        Ok(report)
    }

    /// Current state of every running loop
    pub fn states(&self) -> Vec<(String, WatcherState)> {
        self.running
            .iter()
            .map(|running| (running.hostname.clone(), *running.state.borrow()))
            .collect()
    }

    /// Whether loops have been started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Number of records not yet started
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
