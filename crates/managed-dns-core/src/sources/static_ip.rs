//! Fixed-address value source
//!
//! Useful for records that should always point at a known address, and for
//! tests.

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::traits::{IpVersion, SourceFactory, ValueSource};
use async_trait::async_trait;
use std::net::IpAddr;

/// Source that always answers with a configured address
#[derive(Debug, Clone)]
pub struct StaticSource {
    addresses: Vec<IpAddr>,
}

impl StaticSource {
    /// Create a source answering with the first address of each version
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl ValueSource for StaticSource {
    async fn fetch(&self, version: IpVersion) -> Result<IpAddr> {
        self.addresses
            .iter()
            .copied()
            .find(|ip| version.matches(ip))
            .ok_or_else(|| {
                Error::source_unreachable("static", format!("no {} address configured", version))
            })
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Builds [`StaticSource`]s from [`SourceConfig::Static`]
pub struct StaticSourceFactory;

impl SourceFactory for StaticSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn ValueSource>> {
        match config {
            SourceConfig::Static { addresses } => {
                config.validate()?;
                Ok(Box::new(StaticSource::new(addresses.clone())))
            }
            other => Err(Error::config(format!(
                "static factory cannot build a {} source",
                other.type_name()
            ))),
        }
    }
}
