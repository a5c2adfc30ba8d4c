// # DNS Provider Trait
//
// Defines the interface for publishing DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `managed-dns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use managed_dns_core::traits::{DnsProvider, RecordType};
//
// let provider = /* DnsProvider implementation */;
// provider.upsert(
//     "example.com",
//     "home.example.com",
//     RecordType::A,
//     std::net::IpAddr::from([203, 0, 113, 7]),
//     std::time::Duration::from_secs(300),
// ).await?;
// ```

use super::value_source::IpVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// DNS record type managed by a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// The wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl From<IpVersion> for RecordType {
    fn from(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::Aaaa,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for DNS provider implementations
///
/// The watcher depends only on this narrow contract, never on
/// backend-specific types.
///
/// # Ownership
///
/// Each record owns its provider instance exclusively and calls it from its
/// own watcher loop only, so calls on one instance never overlap. Two records
/// configured against the same backend account get two instances.
///
/// # Contract
///
/// - **Single-shot**: one logical operation per call, no retry or backoff.
///   The watcher retries on its next tick.
/// - **Idempotent**: `upsert` with the value already published is a no-op,
///   `delete` of a missing record succeeds.
/// - **Classified failures**: return [`Error::Provider`](crate::Error::Provider)
///   with a [`ProviderErrorCode`](crate::ProviderErrorCode). A `RateLimited`
///   code makes the watcher skip one extra tick.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create or update the record so it points at `value`
    ///
    /// # Parameters
    ///
    /// - `zone`: The zone containing the record (e.g. "example.com")
    /// - `name`: The fully qualified record name (e.g. "home.example.com")
    /// - `record_type`: `A` or `AAAA`
    /// - `value`: The address to publish
    /// - `ttl`: Record TTL, zero means the provider's default
    ///
    /// # Returns
    ///
    /// - `Ok(Some(previous))`: The record existed with `previous` as content
    /// - `Ok(None)`: The record was created
    /// - `Err(Error)`: The backend rejected or failed the request
    async fn upsert(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        value: IpAddr,
        ttl: Duration,
    ) -> Result<Option<IpAddr>, crate::Error>;

    /// Delete the record
    ///
    /// Deleting a record that does not exist succeeds.
    async fn delete(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    ///
    /// A static string identifying the provider (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait ProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
