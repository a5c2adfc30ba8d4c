//! Contract Test: Provisioning and Lifecycle
//!
//! Constraints verified:
//! - Records are built only from backends registered with the registry
//! - Provisioning is all or nothing
//! - One invalid record does not keep the others from starting
//! - Delete-after-use removes each managed record type exactly once on stop
//!
//! If this test fails, the supervisor is bypassing the registry or leaking
//! records on shutdown.

mod common;

use common::*;
use managed_dns_core::config::{IpVersions, RecordConfig};
use managed_dns_core::traits::{IpVersion, ProviderFactory};
use managed_dns_core::{
    AppConfig, DnsProvider, Error, ManagedRecordConfig, ProviderConfig, Record, RecordType,
    Registry, SourceConfig, Supervisor, WatcherEvent,
};
use serde_json::json;

/// Hands out clones of one RecordingProvider
struct RecordingFactory(RecordingProvider);

impl ProviderFactory for RecordingFactory {
    fn create(&self, _config: &ProviderConfig) -> managed_dns_core::Result<Box<dyn DnsProvider>> {
        Ok(Box::new(self.0.clone()))
    }
}

fn recording_registry(provider: &RecordingProvider) -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register_provider("recording", Box::new(RecordingFactory(provider.clone())));
    registry
}

fn recording_provider_config() -> ProviderConfig {
    ProviderConfig::Custom {
        factory: "recording".to_string(),
        config: json!({}),
    }
}

fn static_record(hostname: &str, address: &str) -> ManagedRecordConfig {
    let mut record = ManagedRecordConfig::new(hostname);
    record.ip_sources = vec![SourceConfig::Static {
        addresses: vec![ip(address)],
    }];
    record.versions = IpVersions::only(IpVersion::V4);
    record
}

#[tokio::test(start_paused = true)]
async fn provisioned_records_publish() {
    let provider = RecordingProvider::new();
    let mut config = AppConfig::new(vec![
        static_record("a.example.com", "198.51.100.50"),
        static_record("b.example.com", "198.51.100.51"),
    ])
    .with_dns_provider(recording_provider_config());
    config.check_interval_secs = Some(60);

    let (mut supervisor, mut events) =
        Supervisor::provision(&config, &recording_registry(&provider)).unwrap();
    let report = supervisor.start().unwrap();
    assert!(report.is_complete());

    tokio::time::sleep(INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    let mut upserts = provider.upserts();
    upserts.sort();
    assert_eq!(
        upserts,
        vec![
            ("a.example.com".to_string(), RecordType::A, ip("198.51.100.50")),
            ("b.example.com".to_string(), RecordType::A, ip("198.51.100.51")),
        ]
    );

    let published = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, WatcherEvent::Published { .. }))
        .count();
    assert_eq!(published, 2);
}

#[test]
fn provisioning_fails_as_a_whole() {
    let provider = RecordingProvider::new();
    let mut unknown_source = static_record("b.example.com", "198.51.100.51");
    unknown_source.ip_sources = vec![SourceConfig::Custom {
        factory: "carrier-pigeon".to_string(),
        config: json!({}),
    }];

    let config = AppConfig::new(vec![
        static_record("a.example.com", "198.51.100.50"),
        unknown_source,
    ])
    .with_dns_provider(recording_provider_config());

    let err = Supervisor::provision(&config, &recording_registry(&provider))
        .err()
        .unwrap();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("carrier-pigeon"));
}

#[test]
fn default_source_needs_http_registered() {
    let provider = RecordingProvider::new();
    let config = AppConfig::new(vec![ManagedRecordConfig::new("a.example.com")])
        .with_dns_provider(recording_provider_config());

    let err = Supervisor::provision(&config, &recording_registry(&provider))
        .err()
        .unwrap();
    assert!(err.to_string().contains("Unknown source type: http"));
}

#[test]
fn missing_provider_is_a_config_error() {
    let config = AppConfig::new(vec![static_record("a.example.com", "198.51.100.50")]);

    let err = Supervisor::provision(&config, &Registry::with_builtins())
        .err()
        .unwrap();
    assert!(err.to_string().contains("a DNS provider is required"));
}

#[tokio::test(start_paused = true)]
async fn invalid_record_does_not_block_others() {
    let provider = RecordingProvider::new();
    let good = v4_record(
        "good.example.com",
        vec![ScriptedSource::fixed("fixed", ip("198.51.100.52"))],
        &provider,
    );
    let no_sources = v4_record("empty.example.com", Vec::new(), &provider);

    let (mut supervisor, _events) =
        Supervisor::new(vec![good, no_sources], test_supervisor_config());
    let report = supervisor.start().unwrap();

    assert_eq!(report.started, vec!["good.example.com".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "empty.example.com");
    assert!(matches!(report.failed[0].1, Error::Config(_)));

    tokio::time::sleep(INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert_eq!(provider.upserted_values(), vec![ip("198.51.100.52")]);
}

#[tokio::test(start_paused = true)]
async fn delete_after_use_deletes_once_on_stop() {
    let provider = RecordingProvider::new();
    let config = RecordConfig::new("temp.example.com")
        .with_check_interval(INTERVAL)
        .with_versions(IpVersions::only(IpVersion::V4))
        .with_delete_after_use(true);
    let record = Record::new(
        config,
        vec![Box::new(ScriptedSource::fixed("fixed", ip("198.51.100.53")))],
        Box::new(provider.clone()),
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
    assert!(provider.deletes().is_empty(), "nothing is deleted while running");

    supervisor.stop().await.unwrap();
    supervisor.stop().await.unwrap();

    assert_eq!(
        provider.deletes(),
        vec![("temp.example.com".to_string(), RecordType::A)]
    );
    assert!(drain(&mut events).contains(&WatcherEvent::Deleted {
        hostname: "temp.example.com".to_string(),
        record_type: RecordType::A,
    }));
}

#[tokio::test(start_paused = true)]
async fn records_are_kept_without_delete_after_use() {
    let provider = RecordingProvider::new();
    let record = v4_record(
        "keep.example.com",
        vec![ScriptedSource::fixed("fixed", ip("198.51.100.54"))],
        &provider,
    );

    let (mut supervisor, _events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();
    tokio::time::sleep(INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert!(provider.deletes().is_empty());
}
