//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call so tests can assert on what the watcher
//! loops actually asked of their sources and providers.

#![allow(dead_code)]

use managed_dns_core::config::{IpVersions, RecordConfig, SupervisorConfig};
use managed_dns_core::error::{Error, ProviderErrorCode, Result};
use managed_dns_core::traits::{DnsProvider, IpVersion, RecordType, ValueSource};
use managed_dns_core::{Record, WatcherEvent};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Check interval used by the test records
pub const INTERVAL: Duration = Duration::from_secs(60);

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A source that plays back a script, one entry per call
///
/// `None` entries fail. Once exhausted the last entry repeats. Clones share
/// the script position and call counter.
#[derive(Clone)]
pub struct ScriptedSource {
    name: String,
    script: Arc<Vec<Option<IpAddr>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(name: &str, script: Vec<Option<IpAddr>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one entry");
        Self {
            name: name.to_string(),
            script: Arc::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always returns `value`
    pub fn fixed(name: &str, value: IpAddr) -> Self {
        Self::new(name, vec![Some(value)])
    }

    /// A source that always fails
    pub fn failing(name: &str) -> Self {
        Self::new(name, vec![None])
    }

    /// Get the number of times fetch() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ValueSource for ScriptedSource {
    async fn fetch(&self, _version: IpVersion) -> Result<IpAddr> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.script.len() - 1);

        self.script[index]
            .ok_or_else(|| Error::source_unreachable(self.name.clone(), "scripted failure"))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// A source that answers after a delay, or never for the versions it hangs on
#[derive(Clone)]
pub struct DelayedSource {
    name: String,
    delay: Duration,
    answers: Vec<IpAddr>,
    hang: Vec<IpVersion>,
}

impl DelayedSource {
    /// Answer with the first of `answers` matching the requested version
    pub fn new(name: &str, delay: Duration, answers: Vec<IpAddr>) -> Self {
        Self {
            name: name.to_string(),
            delay,
            answers,
            hang: Vec::new(),
        }
    }

    /// A source that never answers
    pub fn hung(name: &str) -> Self {
        Self::new(name, Duration::ZERO, Vec::new())
            .hanging_on(IpVersion::V4)
            .hanging_on(IpVersion::V6)
    }

    /// Never answer requests for `version`
    pub fn hanging_on(mut self, version: IpVersion) -> Self {
        self.hang.push(version);
        self
    }
}

#[async_trait::async_trait]
impl ValueSource for DelayedSource {
    async fn fetch(&self, version: IpVersion) -> Result<IpAddr> {
        if self.hang.contains(&version) {
            std::future::pending::<()>().await;
        }

        tokio::time::sleep(self.delay).await;
        self.answers
            .iter()
            .copied()
            .find(|ip| version.matches(ip))
            .ok_or_else(|| Error::source_unreachable(self.name.clone(), "no answer"))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
struct ProviderLog {
    attempts: usize,
    upserts: Vec<(String, RecordType, IpAddr)>,
    deletes: Vec<(String, RecordType)>,
    published: HashMap<(String, RecordType), IpAddr>,
    outcomes: VecDeque<Option<ProviderErrorCode>>,
}

/// A DnsProvider that records calls and can be told to fail or stall
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    log: Arc<Mutex<ProviderLog>>,
    delay: Duration,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every upsert
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next upserts with `codes`, in order
    pub fn failing_with(self, codes: impl IntoIterator<Item = ProviderErrorCode>) -> Self {
        self.with_outcomes(codes.into_iter().map(Some))
    }

    /// Script the next upserts, `None` succeeds and `Some(code)` fails
    pub fn with_outcomes(
        self,
        outcomes: impl IntoIterator<Item = Option<ProviderErrorCode>>,
    ) -> Self {
        self.log.lock().unwrap().outcomes.extend(outcomes);
        self
    }

    /// Number of upsert calls, successful or not
    pub fn attempts(&self) -> usize {
        self.log.lock().unwrap().attempts
    }

    /// Successful upserts in call order
    pub fn upserts(&self) -> Vec<(String, RecordType, IpAddr)> {
        self.log.lock().unwrap().upserts.clone()
    }

    /// Values of the successful upserts in call order
    pub fn upserted_values(&self) -> Vec<IpAddr> {
        self.upserts().into_iter().map(|(_, _, value)| value).collect()
    }

    /// Delete calls in call order
    pub fn deletes(&self) -> Vec<(String, RecordType)> {
        self.log.lock().unwrap().deletes.clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn upsert(
        &self,
        _zone: &str,
        name: &str,
        record_type: RecordType,
        value: IpAddr,
        _ttl: Duration,
    ) -> Result<Option<IpAddr>> {
        self.log.lock().unwrap().attempts += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut log = self.log.lock().unwrap();
        if let Some(Some(code)) = log.outcomes.pop_front() {
            return Err(Error::provider("recording", code, "scripted failure"));
        }

        log.upserts.push((name.to_string(), record_type, value));
        Ok(log.published.insert((name.to_string(), record_type), value))
    }

    async fn delete(&self, _zone: &str, name: &str, record_type: RecordType) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.deletes.push((name.to_string(), record_type));
        log.published.remove(&(name.to_string(), record_type));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// An IPv4-only record checked every [`INTERVAL`]
pub fn v4_record(
    hostname: &str,
    sources: Vec<ScriptedSource>,
    provider: &RecordingProvider,
) -> Record {
    let config = RecordConfig::new(hostname)
        .with_check_interval(INTERVAL)
        .with_versions(IpVersions::only(IpVersion::V4));

    Record::new(
        config,
        sources
            .into_iter()
            .map(|source| Box::new(source) as Box<dyn ValueSource>)
            .collect(),
        Box::new(provider.clone()),
    )
}

/// A record over arbitrary sources checked every [`INTERVAL`]
pub fn record_with(
    hostname: &str,
    versions: IpVersions,
    sources: Vec<Box<dyn ValueSource>>,
    provider: &RecordingProvider,
) -> Record {
    let config = RecordConfig::new(hostname)
        .with_check_interval(INTERVAL)
        .with_versions(versions);

    Record::new(config, sources, Box::new(provider.clone()))
}

/// Supervisor settings for tests
pub fn test_supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        shutdown_timeout_secs: 30,
        fetch_timeout_secs: 5,
        provider_timeout_secs: 30,
        event_channel_capacity: 100,
    }
}

/// Collect every event currently queued
pub fn drain(rx: &mut mpsc::Receiver<WatcherEvent>) -> Vec<WatcherEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
