//! Minimal embedding example for managed-dns-core
//!
//! The application supplies its own provider, registers it, provisions the
//! supervisor and owns its whole lifecycle.

use managed_dns_core::config::{ManagedRecordConfig, ProviderConfig, SourceConfig};
use managed_dns_core::traits::{DnsProvider, ProviderFactory, RecordType};
use managed_dns_core::{AppConfig, Registry, Result, Supervisor};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Provider that prints instead of calling an API
struct EmbeddedProvider {
    update_calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl DnsProvider for EmbeddedProvider {
    async fn upsert(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        value: IpAddr,
        ttl: Duration,
    ) -> Result<Option<IpAddr>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        println!(
            "[Embedded] {} {} -> {} in {} (ttl {:?})",
            name, record_type, value, zone, ttl
        );
        Ok(None)
    }

    async fn delete(&self, zone: &str, name: &str, record_type: RecordType) -> Result<()> {
        println!("[Embedded] delete {} {} in {}", name, record_type, zone);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "embedded"
    }
}

/// Builds EmbeddedProviders sharing one call counter
struct EmbeddedFactory {
    update_calls: Arc<AtomicUsize>,
}

impl ProviderFactory for EmbeddedFactory {
    fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(EmbeddedProvider {
            update_calls: self.update_calls.clone(),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Embedded managed-dns-core Example ===\n");

    let update_calls = Arc::new(AtomicUsize::new(0));

    let mut registry = Registry::with_builtins();
    registry.register_provider(
        "embedded",
        Box::new(EmbeddedFactory {
            update_calls: update_calls.clone(),
        }),
    );

    let mut record = ManagedRecordConfig::new("home.example.com");
    record.ip_sources = vec![SourceConfig::Static {
        addresses: vec![
            IpAddr::from([192, 0, 2, 1]),
            IpAddr::from([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]),
        ],
    }];
    record.check_interval_secs = Some(1);
    record.delete_after_use = true;

    let config = AppConfig::new(vec![record]).with_dns_provider(ProviderConfig::Custom {
        factory: "embedded".to_string(),
        config: json!({}),
    });

    println!("1. Provisioning...");
    let (mut supervisor, mut events) = Supervisor::provision(&config, &registry)?;

    let event_listener = tokio::spawn(async move {
        println!("2. Event listener started");
        while let Some(event) = events.recv().await {
            println!("[Event] {:?}", event);
        }
        println!("Event listener stopped");
    });

    println!("3. Starting watchers...");
    let report = supervisor.start()?;
    println!("   started: {:?}", report.started);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    println!("\n4. Watchers are running. Application can do other work here.\n");

    println!("5. Stopping...");
    let report = supervisor.stop().await?;
    let _ = event_listener.await;

    println!("\n6. Stopped cleanly.");
    for summary in &report.stopped {
        println!("   {} published {:?}", summary.hostname, summary.published);
    }
    println!("   provider calls: {}", update_calls.load(Ordering::SeqCst));

    Ok(())
}
