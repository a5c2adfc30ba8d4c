// # Value Source Trait
//
// Defines the interface for discovering the value a record should publish,
// normally the host's public IP address.
//
// ## Implementations
//
// - Static addresses: `crate::sources::StaticSource`
// - HTTP "what is my IP" endpoints: `managed-dns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use managed_dns_core::traits::{IpVersion, ValueSource};
//
// let source = /* ValueSource implementation */;
// let ip = source.fetch(IpVersion::V4).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// The version of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// Whether `ip` belongs to this version
    pub fn matches(self, ip: &IpAddr) -> bool {
        Self::of(ip) == self
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("ipv4"),
            IpVersion::V6 => f.write_str("ipv6"),
        }
    }
}

/// Trait for value source implementations
///
/// A source answers one question: what is the current address for the
/// requested IP version? It is called once per tick by the owning watcher
/// loop, in configured order, until one source succeeds.
///
/// # Contract
///
/// - **Stateless**: no caching between calls, the watcher owns the
///   last-published value.
/// - **Read-only**: the only side effect allowed is the lookup itself.
/// - **No timers**: the watcher bounds every call with a timeout and drops the
///   future on expiry or shutdown, so implementations must be
///   cancellation-safe and must not retry or sleep.
///
/// Failures are reported as [`Error::SourceUnreachable`](crate::Error::SourceUnreachable);
/// the watcher moves on to the next source.
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Fetch the current address for `version`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: an address of the requested version
    /// - `Err(Error)`: the source could not produce one
    async fn fetch(&self, version: IpVersion) -> Result<IpAddr, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &str;
}

/// Helper trait for constructing value sources from configuration
pub trait SourceFactory: Send + Sync {
    /// Create a ValueSource instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn ValueSource>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_of_address() {
        let v4: IpAddr = "203.0.113.7".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(IpVersion::of(&v4), IpVersion::V4);
        assert!(IpVersion::V6.matches(&v6));
        assert!(!IpVersion::V6.matches(&v4));
    }
}
