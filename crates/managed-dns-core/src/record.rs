//! Managed record and update decision
//!
//! A [`Record`] binds one [`RecordConfig`] to its ordered value sources, its
//! exclusively owned DNS provider and the cache of what it last published.
//! Only the owning watcher loop mutates the cache.

use crate::config::RecordConfig;
use crate::error::{Error, ProviderErrorCode, Result};
use crate::traits::{DnsProvider, IpVersion, RecordType, ValueSource};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Outcome of comparing a fetched value with the published one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Value unchanged, nothing to do
    Skip,
    /// Value changed (or never published), push it to the provider
    Publish(IpAddr),
}

/// Decide whether `current` needs publishing
///
/// Publishes on the first successful check and whenever the value differs
/// from the last successful publish.
pub fn decide(current: IpAddr, last_published: Option<IpAddr>) -> Decision {
    match last_published {
        Some(last) if last == current => Decision::Skip,
        _ => Decision::Publish(current),
    }
}

/// The instant `timeout` from now, saturating far in the future
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

// Roughly 30 years
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A value accepted by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedValue {
    /// The published address
    pub value: IpAddr,
    /// When the provider accepted it
    pub published_at: DateTime<Utc>,
}

/// Snapshot of a record's published state, reported when its loop stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub hostname: String,
    pub published: BTreeMap<RecordType, PublishedValue>,
}

/// One managed hostname/provider/policy unit
pub struct Record {
    config: RecordConfig,
    zone: String,
    sources: Vec<Box<dyn ValueSource>>,
    provider: Box<dyn DnsProvider>,
    last_published: BTreeMap<RecordType, PublishedValue>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("config", &self.config)
            .field("zone", &self.zone)
            .field(
                "sources",
                &self.sources.iter().map(|s| s.source_name()).collect::<Vec<_>>(),
            )
            .field("provider", &self.provider.provider_name())
            .field("last_published", &self.last_published)
            .finish()
    }
}

impl Record {
    /// Create a record
    ///
    /// The record starts with nothing published, so its first successful
    /// check always publishes.
    pub fn new(
        config: RecordConfig,
        sources: Vec<Box<dyn ValueSource>>,
        provider: Box<dyn DnsProvider>,
    ) -> Self {
        let zone = config.zone();
        Self {
            config,
            zone,
            sources,
            provider,
            last_published: BTreeMap::new(),
        }
    }

    /// The record's configuration
    pub fn config(&self) -> &RecordConfig {
        &self.config
    }

    /// The hostname this record publishes
    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    /// The zone this record lives in
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Name of the owned provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Record types this record manages, one per enabled IP version
    pub fn record_types(&self) -> Vec<(IpVersion, RecordType)> {
        self.config
            .versions
            .enabled()
            .into_iter()
            .map(|version| (version, RecordType::from(version)))
            .collect()
    }

    /// Last value accepted by the provider for `record_type`
    pub fn last_published(&self, record_type: RecordType) -> Option<&PublishedValue> {
        self.last_published.get(&record_type)
    }

    /// Decide whether `current` needs publishing for `record_type`
    pub fn decide(&self, record_type: RecordType, current: IpAddr) -> Decision {
        decide(current, self.last_published(record_type).map(|p| p.value))
    }

    /// Check that the record can be run
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;

        if self.sources.is_empty() {
            return Err(Error::config(format!(
                "no value sources configured for {}",
                self.config.hostname
            )));
        }

        Ok(())
    }

    /// Fetch the current value, trying sources in order
    ///
    /// `timeout` bounds the whole fetch. Each source gets an equal share of
    /// what is left when its turn comes, so a hung source cannot starve the
    /// ones after it. Returns the first address of the requested version
    /// together with the name of the source that produced it.
    ///
    /// # Errors
    ///
    /// [`Error::NoSourceAvailable`] when every source failed.
    pub async fn fetch(&self, version: IpVersion, timeout: Duration) -> Result<(IpAddr, String)> {
        let deadline = deadline_after(timeout);
        let count = self.sources.len();

        for (index, source) in self.sources.iter().enumerate() {
            let name = source.source_name();
            let remaining = deadline.saturating_duration_since(Instant::now());
            let share = remaining / (count - index) as u32;

            let attempt = match tokio::time::timeout(share, source.fetch(version)).await {
                Ok(Ok(ip)) if version.matches(&ip) => Ok(ip),
                Ok(Ok(ip)) => Err(Error::source_unreachable(
                    name,
                    format!("returned {} while {} was requested", ip, version),
                )),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::source_unreachable(
                    name,
                    format!("fetch timed out after {:?}", share),
                )),
            };

            match attempt {
                Ok(ip) => {
                    debug!("{} {}: source {} returned {}", self.hostname(), version, name, ip);
                    return Ok((ip, name.to_string()));
                }
                Err(e) => {
                    warn!("{} {}: source {} failed: {}", self.hostname(), version, name, e);
                }
            }
        }

        Err(Error::NoSourceAvailable {
            hostname: self.config.hostname.clone(),
            attempts: count,
        })
    }

    /// Push `value` to the provider and advance the cache on success
    ///
    /// On failure the cache is left untouched so the next tick retries
    /// against the same baseline.
    pub async fn publish(
        &mut self,
        record_type: RecordType,
        value: IpAddr,
        timeout: Duration,
    ) -> Result<Option<IpAddr>> {
        let call = self.provider.upsert(
            &self.zone,
            &self.config.hostname,
            record_type,
            value,
            self.config.ttl,
        );

        let previous = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::provider(
                    self.provider.provider_name(),
                    ProviderErrorCode::Transient,
                    format!("upsert timed out after {:?}", timeout),
                ));
            }
        };

        self.last_published.insert(
            record_type,
            PublishedValue {
                value,
                published_at: Utc::now(),
            },
        );

        Ok(previous)
    }

    /// Delete the record of `record_type` from the provider
    pub async fn delete(&self, record_type: RecordType, timeout: Duration) -> Result<()> {
        let call = self
            .provider
            .delete(&self.zone, &self.config.hostname, record_type);

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::provider(
                self.provider.provider_name(),
                ProviderErrorCode::Transient,
                format!("delete timed out after {:?}", timeout),
            )),
        }
    }

    /// Snapshot of what this record has published
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            hostname: self.config.hostname.clone(),
            published: self.last_published.clone(),
        }
    }
}
