//! Configuration types for the managed DNS system
//!
//! The host application deserializes an [`AppConfig`] however it likes and
//! hands it to [`Supervisor::provision`](crate::Supervisor::provision). Each
//! [`ManagedRecordConfig`] is resolved into an immutable [`RecordConfig`]
//! plus the source and provider instances built through the
//! [`Registry`](crate::Registry).

use crate::traits::IpVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Check interval used when none is configured, or when zero is configured
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Largest accepted check interval or timeout (30 days)
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Top-level configuration handed over by the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Records to keep in sync
    pub records: Vec<ManagedRecordConfig>,

    /// Provider used by records that do not configure their own
    #[serde(default)]
    pub dns_provider: Option<ProviderConfig>,

    /// Check interval for records that do not set one (in seconds)
    #[serde(default)]
    pub check_interval_secs: Option<u64>,

    /// TTL for records that do not set one (in seconds)
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Supervisor and watcher settings
    #[serde(flatten)]
    pub supervisor: SupervisorConfig,
}

impl AppConfig {
    /// Create a configuration for the given records with defaults
    pub fn new(records: Vec<ManagedRecordConfig>) -> Self {
        Self {
            records,
            dns_provider: None,
            check_interval_secs: None,
            ttl_secs: None,
            supervisor: SupervisorConfig::default(),
        }
    }

    /// Set the provider inherited by records without one
    pub fn with_dns_provider(mut self, provider: ProviderConfig) -> Self {
        self.dns_provider = Some(provider);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.records.is_empty() {
            return Err(crate::Error::config("No records configured"));
        }

        if let Some(provider) = &self.dns_provider {
            provider.validate()?;
        }

        self.supervisor.validate()
    }
}

/// Per-record configuration as supplied by the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedRecordConfig {
    /// Fully qualified hostname to publish (e.g. "home.example.com")
    pub hostname: String,

    /// Zone containing the hostname, derived from the hostname when absent
    #[serde(default)]
    pub zone: Option<String>,

    /// Sources tried in order; the default HTTP source when empty
    #[serde(default)]
    pub ip_sources: Vec<SourceConfig>,

    /// IP versions to publish
    #[serde(default)]
    pub versions: IpVersions,

    /// Provider for this record, falls back to [`AppConfig::dns_provider`]
    #[serde(default)]
    pub provider: Option<ProviderConfig>,

    /// How often to check the source (in seconds). Default: 30 minutes
    #[serde(default)]
    pub check_interval_secs: Option<u64>,

    /// TTL to set on the record (in seconds). Zero means provider default
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Whether to delete the record when the watcher stops
    #[serde(default)]
    pub delete_after_use: bool,
}

impl ManagedRecordConfig {
    /// Create a record configuration with defaults
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            zone: None,
            ip_sources: Vec::new(),
            versions: IpVersions::default(),
            provider: None,
            check_interval_secs: None,
            ttl_secs: None,
            delete_after_use: false,
        }
    }

    /// The sources to build, substituting the default source when none are set
    pub fn effective_sources(&self) -> Vec<SourceConfig> {
        if self.ip_sources.is_empty() {
            vec![SourceConfig::default()]
        } else {
            self.ip_sources.clone()
        }
    }

    /// The provider to build, falling back to the app-level provider
    pub fn effective_provider<'a>(
        &'a self,
        app: &'a AppConfig,
    ) -> Result<&'a ProviderConfig, crate::Error> {
        self.provider
            .as_ref()
            .or(app.dns_provider.as_ref())
            .ok_or_else(|| {
                crate::Error::config(format!(
                    "a DNS provider is required for {}",
                    self.hostname
                ))
            })
    }

    /// Resolve into the immutable [`RecordConfig`], applying app-level defaults
    pub fn resolve(&self, app: &AppConfig) -> Result<RecordConfig, crate::Error> {
        let check_interval = self
            .check_interval_secs
            .or(app.check_interval_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CHECK_INTERVAL);
        let ttl = self
            .ttl_secs
            .or(app.ttl_secs)
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);

        let mut record = RecordConfig::new(self.hostname.clone())
            .with_check_interval(check_interval)
            .with_ttl(ttl)
            .with_versions(self.versions)
            .with_delete_after_use(self.delete_after_use);
        if let Some(zone) = &self.zone {
            record = record.with_zone(zone.clone());
        }

        record.validate()?;
        Ok(record)
    }
}

/// Immutable policy for one managed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConfig {
    /// Fully qualified hostname
    pub hostname: String,

    /// Explicit zone, see [`RecordConfig::zone`]
    pub zone: Option<String>,

    /// Time between ticks, never zero
    pub check_interval: Duration,

    /// TTL to publish with, zero means provider default
    pub ttl: Duration,

    /// Delete the published records when the watcher stops
    pub delete_after_use: bool,

    /// IP versions to publish
    pub versions: IpVersions,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            zone: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            ttl: Duration::ZERO,
            delete_after_use: false,
            versions: IpVersions::default(),
        }
    }

    /// Set the zone
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Set the check interval; zero resolves to [`DEFAULT_CHECK_INTERVAL`]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = if interval.is_zero() {
            DEFAULT_CHECK_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Delete the records on stop
    pub fn with_delete_after_use(mut self, delete_after_use: bool) -> Self {
        self.delete_after_use = delete_after_use;
        self
    }

    /// Set the IP versions
    pub fn with_versions(mut self, versions: IpVersions) -> Self {
        self.versions = versions;
        self
    }

    /// The zone holding this record
    ///
    /// Uses the configured zone when set. Otherwise takes the last two labels
    /// of the hostname, or the last three for two-level public suffixes such
    /// as `co.uk` (a two-letter TLD preceded by a label of at most three
    /// characters). Configure the zone explicitly when this guess is wrong.
    pub fn zone(&self) -> String {
        if let Some(zone) = &self.zone {
            return zone.trim_end_matches('.').to_string();
        }

        let hostname = self.hostname.trim_end_matches('.');
        let parts: Vec<&str> = hostname.split('.').collect();
        if parts.len() < 2 {
            return hostname.to_string();
        }

        let n = parts.len();
        if n >= 3 && parts[n - 1].len() == 2 && parts[n - 2].len() <= 3 {
            parts[n - 3..].join(".")
        } else {
            parts[n - 2..].join(".")
        }
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_hostname(&self.hostname)?;

        if self.check_interval.is_zero() {
            return Err(crate::Error::config(format!(
                "check interval for {} must be > 0",
                self.hostname
            )));
        }

        if self.check_interval > Duration::from_secs(MAX_DURATION_SECS) {
            return Err(crate::Error::config(format!(
                "check interval for {} must be at most {}s",
                self.hostname, MAX_DURATION_SECS
            )));
        }

        if self.versions.enabled().is_empty() {
            return Err(crate::Error::config(format!(
                "at least one IP version must be enabled for {}",
                self.hostname
            )));
        }

        if let Some(zone) = &self.zone {
            let zone = zone.trim_end_matches('.');
            let host = self.hostname.trim_end_matches('.');
            if host != zone && !host.ends_with(&format!(".{}", zone)) {
                return Err(crate::Error::config(format!(
                    "hostname {} is not inside zone {}",
                    self.hostname, zone
                )));
            }
        }

        Ok(())
    }
}

/// Validate that a string is a usable hostname
///
/// Basic RFC 1035 checks: total length, label length, characters, and at
/// least two labels so a zone can be derived.
pub fn validate_hostname(hostname: &str) -> Result<(), crate::Error> {
    let hostname = hostname.trim_end_matches('.');
    if hostname.is_empty() {
        return Err(crate::Error::config("hostname cannot be empty"));
    }

    if hostname.len() > 253 {
        return Err(crate::Error::config(format!(
            "hostname too long: {} chars (max 253)",
            hostname.len()
        )));
    }

    if !hostname.contains('.') {
        return Err(crate::Error::config(format!(
            "hostname {} has no zone part",
            hostname
        )));
    }

    for label in hostname.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "hostname has empty label: '{}'",
                hostname
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "hostname label too long: '{}'",
                label
            )));
        }

        // '*' allowed as a whole wildcard label, '_' for service labels
        if label != "*"
            && !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "hostname label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "hostname label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// Which IP versions a record publishes
///
/// Both versions are enabled unless explicitly disabled, so
/// `{"ipv6": false}` publishes only an `A` record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpVersions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<bool>,
}

impl IpVersions {
    /// Only the given version
    pub fn only(version: IpVersion) -> Self {
        Self {
            ipv4: Some(version == IpVersion::V4),
            ipv6: Some(version == IpVersion::V6),
        }
    }

    /// Whether IPv4 is enabled
    pub fn v4(&self) -> bool {
        self.ipv4.unwrap_or(true)
    }

    /// Whether IPv6 is enabled
    pub fn v6(&self) -> bool {
        self.ipv6.unwrap_or(true)
    }

    /// Enabled versions, IPv4 first
    pub fn enabled(&self) -> Vec<IpVersion> {
        let mut versions = Vec::with_capacity(2);
        if self.v4() {
            versions.push(IpVersion::V4);
        }
        if self.v6() {
            versions.push(IpVersion::V6);
        }
        versions
    }
}

/// Value source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Plain-text "what is my IP" HTTP endpoints
    Http {
        /// Endpoints tried in order; the built-in list when empty
        #[serde(default)]
        urls: Vec<String>,
    },

    /// Fixed addresses
    Static {
        /// Addresses to publish, the first of each version is used
        addresses: Vec<IpAddr>,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Http { urls } => {
                for url in urls {
                    if !url.starts_with("https://") && !url.starts_with("http://") {
                        return Err(crate::Error::config(format!(
                            "HTTP source URL must use http or https: {}",
                            url
                        )));
                    }
                }
                Ok(())
            }
            SourceConfig::Static { addresses } => {
                if addresses.is_empty() {
                    return Err(crate::Error::config(
                        "Static source needs at least one address",
                    ));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Http { .. } => "http",
            SourceConfig::Static { .. } => "static",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Http { urls: Vec::new() }
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID (optional, looked up from the zone name otherwise)
        #[serde(default)]
        zone_id: Option<String>,
        /// Perform lookups but skip writes
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

// Keeps API tokens out of logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Cloudflare { zone_id, dry_run, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("zone_id", zone_id)
                .field("dry_run", dry_run)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<opaque>")
                .finish(),
        }
    }
}

/// Supervisor and watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Grace period for all loops to stop (in seconds)
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Upper bound for fetching one record type across its sources (in seconds)
    ///
    /// Always capped to half the record's check interval.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound for a single provider call (in seconds)
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Capacity of the watcher event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SupervisorConfig {
    /// Shutdown grace period
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Overall fetch timeout before capping to the check interval
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Provider call timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("fetch timeout must be > 0"));
        }
        if self.provider_timeout_secs == 0 {
            return Err(crate::Error::config("provider timeout must be > 0"));
        }
        for (name, secs) in [
            ("shutdown timeout", self.shutdown_timeout_secs),
            ("fetch timeout", self.fetch_timeout_secs),
            ("provider timeout", self.provider_timeout_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(crate::Error::config(format!(
                    "{} must be at most {}s",
                    name, MAX_DURATION_SECS
                )));
            }
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
