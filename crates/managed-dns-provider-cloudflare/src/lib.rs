// # Cloudflare DNS Provider
//
// Publishes `A`/`AAAA` records through the Cloudflare API v4.
//
// ## Behavior
//
// - One logical operation per call, no retry or backoff (the watcher retries
//   on its next tick)
// - Idempotent: an upsert with the content already published issues no write,
//   deleting a missing record succeeds
// - Dry-run mode performs all lookups and logs the writes it would make
// - HTTP status codes are classified into `ProviderErrorCode`s, `429` becomes
//   `RateLimited` so the watcher backs off one tick
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use managed_dns_core::config::ProviderConfig;
use managed_dns_core::traits::{DnsProvider, ProviderFactory, RecordType};
use managed_dns_core::{Error, ProviderErrorCode, Registry, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL value Cloudflare treats as "automatic"
const AUTOMATIC_TTL: u64 = 1;

/// Response envelope shared by every API v4 endpoint
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    content: String,
    #[serde(default)]
    proxied: bool,
}

/// Classify an HTTP status
pub fn error_code(status: StatusCode) -> ProviderErrorCode {
    match status.as_u16() {
        401 | 403 => ProviderErrorCode::Authentication,
        404 => ProviderErrorCode::NotFound,
        409 => ProviderErrorCode::Conflict,
        429 => ProviderErrorCode::RateLimited,
        500..=599 => ProviderErrorCode::Transient,
        _ => ProviderErrorCode::Rejected,
    }
}

/// Cloudflare TTL in seconds; zero selects automatic
fn cloudflare_ttl(ttl: Duration) -> u64 {
    match ttl.as_secs() {
        0 => AUTOMATIC_TTL,
        secs => secs,
    }
}

fn provider_error(code: ProviderErrorCode, message: impl Into<String>) -> Error {
    Error::provider("cloudflare", code, message)
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the intended write
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone ID (optional, looked up from the zone name otherwise)
    zone_id: Option<String>,

    /// API base URL
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform lookups but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone ID (looked up per call otherwise)
    /// - `dry_run`: If true, perform lookups but skip writes
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the token is empty or the HTTP client cannot be built.
    pub fn new(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send an authenticated request and unwrap the API envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                provider_error(
                    ProviderErrorCode::Transient,
                    format!("{}: HTTP request failed: {}", action, e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(provider_error(
                error_code(status),
                format!("{} failed: {} - {}", action, status, error_text),
            ));
        }

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            provider_error(
                ProviderErrorCode::Other,
                format!("{}: failed to parse response: {}", action, e),
            )
        })?;

        if !body.success {
            let messages: Vec<String> = body
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect();
            return Err(provider_error(
                ProviderErrorCode::Rejected,
                format!("{} rejected: {}", action, messages.join("; ")),
            ));
        }

        body.result.ok_or_else(|| {
            provider_error(
                ProviderErrorCode::Other,
                format!("{}: response has no result", action),
            )
        })
    }

    /// Get the zone ID for `zone`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn zone_id(&self, zone: &str) -> Result<String> {
        if let Some(ref zone_id) = self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.clone());
        }

        tracing::debug!("Looking up zone ID for: {}", zone);

        let url = format!("{}/zones", self.base_url);
        let zones: Vec<Zone> = self
            .send(self.client.get(&url).query(&[("name", zone)]), "zone lookup")
            .await?;

        let zone_id = zones
            .into_iter()
            .next()
            .map(|z| z.id)
            .ok_or_else(|| {
                provider_error(
                    ProviderErrorCode::NotFound,
                    format!("Zone not found: {}", zone),
                )
            })?;

        tracing::debug!("Found zone ID: {}", zone_id);
        Ok(zone_id)
    }

    /// Find the record of `record_type` named `name`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn find_record(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let records: Vec<DnsRecord> = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("name", name), ("type", record_type.as_str())]),
                "record lookup",
            )
            .await?;

        Ok(records.into_iter().next())
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn upsert(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        value: IpAddr,
        ttl: Duration,
    ) -> Result<Option<IpAddr>> {
        let zone_id = self.zone_id(zone).await?;
        let existing = self.find_record(&zone_id, name, record_type).await?;
        let mode = if self.dry_run { "DRY-RUN" } else { "LIVE" };

        let mut payload = serde_json::json!({
            "type": record_type.as_str(),
            "name": name,
            "content": value.to_string(),
            "ttl": cloudflare_ttl(ttl),
        });

        match existing {
            Some(record) => {
                let previous = record.content.parse::<IpAddr>().ok();
                if previous == Some(value) {
                    tracing::debug!("{} {} already has {}", name, record_type, value);
                    return Ok(previous);
                }

                payload["proxied"] = serde_json::Value::Bool(record.proxied);
                let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record.id);

                tracing::info!(
                    "Updating {} {} -> {} (was: {}) [mode: {}]",
                    name,
                    record_type,
                    value,
                    record.content,
                    mode
                );

                if self.dry_run {
                    tracing::info!("[DRY-RUN] Would send PUT to {} with payload: {}", url, payload);
                    return Ok(previous);
                }

                let _: serde_json::Value = self
                    .send(self.client.put(&url).json(&payload), "record update")
                    .await?;
                Ok(previous)
            }
            None => {
                let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);

                tracing::info!("Creating {} {} -> {} [mode: {}]", name, record_type, value, mode);

                if self.dry_run {
                    tracing::info!(
                        "[DRY-RUN] Would send POST to {} with payload: {}",
                        url,
                        payload
                    );
                    return Ok(None);
                }

                let _: serde_json::Value = self
                    .send(self.client.post(&url).json(&payload), "record create")
                    .await?;
                Ok(None)
            }
        }
    }

    async fn delete(&self, zone: &str, name: &str, record_type: RecordType) -> Result<()> {
        let zone_id = self.zone_id(zone).await?;

        let Some(record) = self.find_record(&zone_id, name, record_type).await? else {
            tracing::debug!("{} {} does not exist, nothing to delete", name, record_type);
            return Ok(());
        };

        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record.id);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would send DELETE to {}", url);
            return Ok(());
        }

        match self
            .send::<serde_json::Value>(self.client.delete(&url), "record delete")
            .await
        {
            Ok(_) => {
                tracing::info!("Deleted {} {}", name, record_type);
                Ok(())
            }
            // Gone between lookup and delete
            Err(e) if e.provider_code() == Some(ProviderErrorCode::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl ProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zone_id.clone(),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use managed_dns_core::Registry;
///
/// let mut registry = Registry::new();
/// managed_dns_provider_cloudflare::register(&mut registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &mut Registry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
