//! Core traits for the managed DNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ValueSource`]: Discover the value a record should publish
//! - [`DnsProvider`]: Publish and delete DNS records via provider APIs

pub mod dns_provider;
pub mod value_source;

pub use dns_provider::{DnsProvider, ProviderFactory, RecordType};
pub use value_source::{IpVersion, SourceFactory, ValueSource};
