//! Per-record watcher loop
//!
//! A [`WatcherLoop`] drives one [`Record`] through repeated
//! check → compare → update cycles on a fixed interval until the shared
//! shutdown signal fires.
//!
//! ## State Machine
//!
//! ```text
//!  Idle ──tick──▶ Checking ──Skip / fetch failed──▶ Sleeping ──tick──▶ Checking …
//!                    │                                 ▲
//!                    └──Publish──▶ Publishing ─────────┘
//!
//!  shutdown observed while Idle, Sleeping or Checking ──▶ (delete) ──▶ Stopped
//! ```
//!
//! ## Scheduling
//!
//! - The first tick fires immediately when the loop starts; later ticks
//!   follow the record's check interval. A cycle that overruns the interval
//!   delays the next tick instead of stacking ticks.
//! - Waiting for a tick and waiting for a source are both raced against the
//!   shutdown signal, shutdown first. Publishing is never interrupted, so an
//!   upsert in flight always completes before the loop stops. The provider
//!   timeout bounds how long that can take.
//! - Each record type gets its own fetch budget, shared out among the
//!   sources in order.
//! - A rate-limited provider response skips one additional tick.

use crate::error::Error;
use crate::record::{Decision, Record, RecordSummary};
use crate::traits::{IpVersion, RecordType};
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a watcher loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Created, first tick not yet fired
    Idle,
    /// Fetching the current value from the sources
    Checking,
    /// Upsert in flight
    Publishing,
    /// Waiting for the next tick
    Sleeping,
    /// Terminated, entered exactly once
    Stopped,
}

/// Events emitted by watcher loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// A source produced a value
    Fetched {
        hostname: String,
        record_type: RecordType,
        value: IpAddr,
        source: String,
    },

    /// The provider accepted a new value
    Published {
        hostname: String,
        record_type: RecordType,
        value: IpAddr,
        previous: Option<IpAddr>,
    },

    /// Value unchanged since the last publish
    Skipped {
        hostname: String,
        record_type: RecordType,
        value: IpAddr,
    },

    /// Every source failed this tick
    FetchFailed {
        hostname: String,
        record_type: RecordType,
        error: String,
    },

    /// The provider rejected or failed the upsert
    PublishFailed {
        hostname: String,
        record_type: RecordType,
        value: IpAddr,
        error: String,
        rate_limited: bool,
    },

    /// A tick was skipped after a rate-limit response
    TickSkipped { hostname: String },

    /// Record deleted on shutdown
    Deleted {
        hostname: String,
        record_type: RecordType,
    },

    /// Record deletion on shutdown failed
    DeleteFailed {
        hostname: String,
        record_type: RecordType,
        error: String,
    },

    /// Loop terminated
    Stopped { hostname: String },
}

/// Per-call time limits applied by the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherTimeouts {
    /// Limit for fetching one record type across all its sources
    pub fetch: Duration,
    /// Limit for one provider call
    pub provider: Duration,
}

impl Default for WatcherTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(10),
            provider: Duration::from_secs(30),
        }
    }
}

/// Whether the loop keeps going after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

/// Watcher loop for a single record
pub struct WatcherLoop {
    record: Record,
    timeouts: WatcherTimeouts,
    shutdown: watch::Receiver<bool>,
    state_tx: watch::Sender<WatcherState>,
    event_tx: mpsc::Sender<WatcherEvent>,
    skip_ticks: u32,
}

impl WatcherLoop {
    /// Create a loop for `record`
    ///
    /// # Parameters
    ///
    /// - `shutdown`: Broadcast signal, the loop stops once it reads `true`
    ///   (or once the sender is dropped)
    /// - `event_tx`: Sink for [`WatcherEvent`]s, full channels drop events
    ///
    /// # Returns
    ///
    /// The loop and a receiver observing its [`WatcherState`]
    pub fn new(
        record: Record,
        timeouts: WatcherTimeouts,
        shutdown: watch::Receiver<bool>,
        event_tx: mpsc::Sender<WatcherEvent>,
    ) -> (Self, watch::Receiver<WatcherState>) {
        let (state_tx, state_rx) = watch::channel(WatcherState::Idle);

        let watcher = Self {
            record,
            timeouts,
            shutdown,
            state_tx,
            event_tx,
            skip_ticks: 0,
        };

        (watcher, state_rx)
    }

    /// The fetch limit for one record type, always below the interval
    fn fetch_timeout(&self) -> Duration {
        let half_interval = self.record.config().check_interval / 2;
        if half_interval.is_zero() {
            self.timeouts.fetch
        } else {
            self.timeouts.fetch.min(half_interval)
        }
    }

    /// Run until shutdown
    ///
    /// Returns a summary of what the record had published when it stopped.
    pub async fn run(mut self) -> RecordSummary {
        let hostname = self.record.hostname().to_string();
        let mut interval = tokio::time::interval(self.record.config().check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Watching {} every {:?} via {}",
            hostname,
            self.record.config().check_interval,
            self.record.provider_name()
        );

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => break,
                _ = interval.tick() => {}
            }

            if self.skip_ticks > 0 {
                self.skip_ticks -= 1;
                debug!("{}: skipping tick after rate limit", hostname);
                self.emit(WatcherEvent::TickSkipped {
                    hostname: hostname.clone(),
                });
                continue;
            }

            if self.run_cycle().await == Flow::Shutdown {
                break;
            }

            self.set_state(WatcherState::Sleeping);
        }

        info!("Shutdown observed for {}", hostname);

        if self.record.config().delete_after_use {
            self.delete_records().await;
        }

        let summary = self.record.summary();
        self.set_state(WatcherState::Stopped);
        self.emit(WatcherEvent::Stopped { hostname });
        summary
    }

    /// One check → compare → update cycle across all enabled record types
    async fn run_cycle(&mut self) -> Flow {
        let fetch_timeout = self.fetch_timeout();

        for (version, record_type) in self.record.record_types() {
            self.set_state(WatcherState::Checking);

            let fetched = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => return Flow::Shutdown,
                result = self.record.fetch(version, fetch_timeout) => result,
            };

            let value = match fetched {
                Ok((value, source)) => {
                    self.emit(WatcherEvent::Fetched {
                        hostname: self.record.hostname().to_string(),
                        record_type,
                        value,
                        source,
                    });
                    value
                }
                Err(e) => {
                    warn!("{} {}: {}", self.record.hostname(), record_type, e);
                    self.emit(WatcherEvent::FetchFailed {
                        hostname: self.record.hostname().to_string(),
                        record_type,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match self.record.decide(record_type, value) {
                Decision::Skip => {
                    debug!(
                        "{} {} already has {}, skipping update",
                        self.record.hostname(),
                        record_type,
                        value
                    );
                    self.emit(WatcherEvent::Skipped {
                        hostname: self.record.hostname().to_string(),
                        record_type,
                        value,
                    });
                }
                Decision::Publish(value) => {
                    if let Err(e) = self.publish(version, record_type, value).await {
                        if e.is_rate_limited() {
                            self.skip_ticks = 1;
                            return Flow::Continue;
                        }
                    }
                }
            }
        }

        Flow::Continue
    }

    /// Upsert `value`; never raced against shutdown
    async fn publish(
        &mut self,
        version: IpVersion,
        record_type: RecordType,
        value: IpAddr,
    ) -> Result<(), Error> {
        self.set_state(WatcherState::Publishing);

        match self
            .record
            .publish(record_type, value, self.timeouts.provider)
            .await
        {
            Ok(previous) => {
                info!(
                    "Published {} {} -> {} (previous: {:?})",
                    self.record.hostname(),
                    record_type,
                    value,
                    previous
                );
                self.emit(WatcherEvent::Published {
                    hostname: self.record.hostname().to_string(),
                    record_type,
                    value,
                    previous,
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to publish {} {} ({}) -> {}: {}",
                    self.record.hostname(),
                    record_type,
                    version,
                    value,
                    e
                );
                self.emit(WatcherEvent::PublishFailed {
                    hostname: self.record.hostname().to_string(),
                    record_type,
                    value,
                    error: e.to_string(),
                    rate_limited: e.is_rate_limited(),
                });
                Err(e)
            }
        }
    }

    /// Delete every managed record type; failures are logged only
    async fn delete_records(&self) {
        for (_, record_type) in self.record.record_types() {
            match self.record.delete(record_type, self.timeouts.provider).await {
                Ok(()) => {
                    info!("Deleted {} {}", self.record.hostname(), record_type);
                    self.emit(WatcherEvent::Deleted {
                        hostname: self.record.hostname().to_string(),
                        record_type,
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to delete {} {}: {}",
                        self.record.hostname(),
                        record_type,
                        e
                    );
                    self.emit(WatcherEvent::DeleteFailed {
                        hostname: self.record.hostname().to_string(),
                        record_type,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    fn set_state(&self, state: WatcherState) {
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: WatcherEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider raising event_channel_capacity."
                );
            }
            // Nobody listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Resolves once the shutdown flag is set or its sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stopped| *stopped).await.is_err() {
        debug!("Shutdown sender dropped");
    }
}
