// # Cloudflare Provider Validation Tool
//
// Exercises the Cloudflare provider against the real API: one upsert and,
// on request, a delete of the same record.
//
// ## Usage
//
// ```bash
// # Dry-run mode (default, reads but never writes)
// CLOUDFLARE_API_TOKEN=your_token \
// MANAGED_DNS_RECORD_NAME=dns-test.example.com \
// MANAGED_DNS_TEST_IP=192.0.2.10 \
// cargo run -p managed-dns-demos --bin cloudflare_validation
//
// # Live mode, removing the record afterwards
// MANAGED_DNS_MODE=live \
// MANAGED_DNS_CLEANUP=1 \
// CLOUDFLARE_API_TOKEN=your_token \
// MANAGED_DNS_RECORD_NAME=dns-test.example.com \
// MANAGED_DNS_TEST_IP=192.0.2.10 \
// cargo run -p managed-dns-demos --bin cloudflare_validation
// ```
//
// ## Environment Variables
//
// Required:
// - `CLOUDFLARE_API_TOKEN`: Cloudflare API token
// - `MANAGED_DNS_RECORD_NAME`: Full record name
// - `MANAGED_DNS_TEST_IP`: Address to publish, its family picks A or AAAA
//
// Optional:
// - `CLOUDFLARE_ZONE_ID`: Zone ID (looked up from the zone name otherwise)
// - `MANAGED_DNS_ZONE`: Zone name (derived from the record name otherwise)
// - `MANAGED_DNS_MODE`: "dry-run" or "live" (default: dry-run)
// - `MANAGED_DNS_CLEANUP`: Delete the record after publishing it

use managed_dns_core::config::RecordConfig;
use managed_dns_core::traits::{DnsProvider, IpVersion, RecordType};
use managed_dns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::net::IpAddr;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error>;

fn required(name: &str) -> Result<String, BoxError> {
    env::var(name).map_err(|_| format!("{} environment variable is required", name).into())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("=== Cloudflare Provider Validation ===");

    let api_token = required("CLOUDFLARE_API_TOKEN")?;
    let record_name = required("MANAGED_DNS_RECORD_NAME")?;
    let test_ip: IpAddr = required("MANAGED_DNS_TEST_IP")?.parse()?;
    let zone_id = env::var("CLOUDFLARE_ZONE_ID").ok();

    let mut record = RecordConfig::new(record_name.as_str());
    if let Ok(zone) = env::var("MANAGED_DNS_ZONE") {
        record = record.with_zone(zone);
    }
    record.validate()?;
    let zone = record.zone();

    let mode = env::var("MANAGED_DNS_MODE").unwrap_or_else(|_| "dry-run".to_string());
    let dry_run = !mode.eq_ignore_ascii_case("live");
    let cleanup = env::var("MANAGED_DNS_CLEANUP").is_ok_and(|v| !v.is_empty() && v != "0");

    if dry_run {
        tracing::warn!("Running in DRY-RUN mode, no changes will be made");
    } else {
        tracing::warn!("Running in LIVE mode, DNS records will change");
    }

    let record_type = RecordType::from(IpVersion::of(&test_ip));

    tracing::info!("Configuration:");
    tracing::info!("  Zone: {}", zone);
    tracing::info!("  Record: {} {}", record_name, record_type);
    tracing::info!("  Test IP: {}", test_ip);
    tracing::info!("  Zone ID: {}", zone_id.as_deref().unwrap_or("(lookup)"));

    tracing::info!("--- Step 1: Creating provider ---");
    let provider = CloudflareProvider::new(api_token, zone_id, dry_run)?;
    tracing::info!("Provider created (token not shown)");

    tracing::info!("--- Step 2: Publishing ---");
    match provider
        .upsert(&zone, &record_name, record_type, test_ip, Duration::ZERO)
        .await
    {
        Ok(Some(previous)) if previous == test_ip => {
            tracing::info!("Record already held {}, nothing written", test_ip)
        }
        Ok(Some(previous)) => tracing::info!("Record updated: {} -> {}", previous, test_ip),
        Ok(None) => tracing::info!("Record created with {}", test_ip),
        Err(e) => {
            tracing::error!("Publish failed: {}", e);
            return Err(e.into());
        }
    }

    if cleanup {
        tracing::info!("--- Step 3: Deleting ---");
        provider.delete(&zone, &record_name, record_type).await?;
        tracing::info!("Record deleted");
    }

    tracing::info!("=== Validation complete ===");
    Ok(())
}
