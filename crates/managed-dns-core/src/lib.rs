// # managed-dns-core
//
// Core library for keeping DNS records in sync with a changing value,
// normally the host's public IP address.
//
// ## Architecture Overview
//
// - **ValueSource**: Trait for discovering the value a record should publish
// - **DnsProvider**: Trait for publishing records via provider APIs
// - **Record**: One hostname with its sources, provider and published cache
// - **WatcherLoop**: Periodic check → compare → update cycle for one record
// - **Supervisor**: Provisions, starts and stops the loops of all records
// - **Registry**: Plugin table mapping config type names to factories
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from backends
// 2. **Polling**: Every record is re-checked on its own interval
// 3. **Plugin-Based**: Backends are registered by the host, no hard-coded if-else
// 4. **Library-First**: The daemon is a thin shell over this crate
// 5. **Idempotency**: A value is only pushed when it differs from the last publish

pub mod config;
pub mod error;
pub mod record;
pub mod registry;
pub mod sources;
pub mod supervisor;
pub mod traits;
pub mod watcher;

// Re-export core types for convenience
pub use config::{
    AppConfig, IpVersions, ManagedRecordConfig, ProviderConfig, RecordConfig, SourceConfig,
    SupervisorConfig,
};
pub use error::{Error, ProviderErrorCode, Result};
pub use record::{Decision, PublishedValue, Record, RecordSummary};
pub use registry::Registry;
pub use sources::StaticSource;
pub use supervisor::{StartReport, StopReport, Supervisor};
pub use traits::{DnsProvider, IpVersion, ProviderFactory, RecordType, SourceFactory, ValueSource};
pub use watcher::{WatcherEvent, WatcherLoop, WatcherState, WatcherTimeouts};
