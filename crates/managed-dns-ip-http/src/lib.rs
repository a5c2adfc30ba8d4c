// # HTTP Value Source
//
// Asks plain-text "what is my IP" services for the host's public address.
//
// ## Address Family
//
// Each request goes out through a client bound to the unspecified address of
// the requested family (`0.0.0.0` or `::`), so the service sees, and echoes,
// the address of that family. An answer of the other family is rejected.
//
// ## Endpoints
//
// Endpoints are tried in order until one answers with a usable address. Every
// request carries its own timeout so a silent endpoint gives way to the next
// one; the watcher still bounds the whole fetch. The source keeps no cache.

use managed_dns_core::config::SourceConfig;
use managed_dns_core::traits::{IpVersion, SourceFactory, ValueSource};
use managed_dns_core::{Error, Registry, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::debug;

/// Timeout for one endpoint request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Endpoints used when none are configured
pub const DEFAULT_URLS: &[&str] = &[
    "https://api64.ipify.org",
    "https://myip.addr.space",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
    "https://ident.me",
];

/// HTTP-based value source
pub struct HttpSource {
    /// Endpoints in the order they are tried
    urls: Vec<String>,

    /// Client bound to 0.0.0.0
    v4_client: reqwest::Client,

    /// Client bound to ::
    v6_client: reqwest::Client,
}

impl HttpSource {
    /// Create a source for `urls`, or for [`DEFAULT_URLS`] when empty
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if an HTTP client cannot be built.
    pub fn new(urls: Vec<String>) -> Result<Self> {
        Self::with_request_timeout(urls, REQUEST_TIMEOUT)
    }

    /// Like [`new`](Self::new) with a custom per-request timeout
    pub fn with_request_timeout(urls: Vec<String>, timeout: Duration) -> Result<Self> {
        let urls = if urls.is_empty() {
            DEFAULT_URLS.iter().map(|url| url.to_string()).collect()
        } else {
            urls
        };

        Ok(Self {
            urls,
            v4_client: bound_client(IpAddr::V4(Ipv4Addr::UNSPECIFIED), timeout)?,
            v6_client: bound_client(IpAddr::V6(Ipv6Addr::UNSPECIFIED), timeout)?,
        })
    }

    /// The endpoints this source queries
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn client(&self, version: IpVersion) -> &reqwest::Client {
        match version {
            IpVersion::V4 => &self.v4_client,
            IpVersion::V6 => &self.v6_client,
        }
    }

    /// Query one endpoint
    async fn query(&self, url: &str, version: IpVersion) -> Result<IpAddr> {
        let response = self
            .client(version)
            .get(url)
            .send()
            .await
            .map_err(|e| {
                Error::source_unreachable("http", format!("{}: request failed: {}", url, e))
            })?;

        if !response.status().is_success() {
            return Err(Error::source_unreachable(
                "http",
                format!("{}: HTTP {}", url, response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| {
                Error::source_unreachable("http", format!("{}: failed to read body: {}", url, e))
            })?;

        let ip = parse_address(&body)
            .ok_or_else(|| Error::source_unreachable("http", format!("{}: not an address", url)))?;

        if !version.matches(&ip) {
            return Err(Error::source_unreachable(
                "http",
                format!("{}: answered {} for an {} request", url, ip, version),
            ));
        }

        Ok(ip)
    }
}

#[async_trait::async_trait]
impl ValueSource for HttpSource {
    async fn fetch(&self, version: IpVersion) -> Result<IpAddr> {
        let mut last_error = None;

        for url in &self.urls {
            match self.query(url, version).await {
                Ok(ip) => return Ok(ip),
                Err(e) => {
                    debug!("{}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(Error::SourceUnreachable { message, .. }) => Error::source_unreachable(
                "http",
                format!("all {} endpoints failed, last: {}", self.urls.len(), message),
            ),
            _ => Error::source_unreachable("http", "no endpoints configured"),
        })
    }

    fn source_name(&self) -> &str {
        "http"
    }
}

fn bound_client(local: IpAddr, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .local_address(local)
        .timeout(timeout)
        .user_agent(concat!("managed-dns/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))
}

/// Parse a plain-text response body
fn parse_address(body: &str) -> Option<IpAddr> {
    body.trim().parse().ok()
}

/// Factory for creating HTTP value sources
pub struct HttpSourceFactory;

impl SourceFactory for HttpSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn ValueSource>> {
        match config {
            SourceConfig::Http { urls } => {
                config.validate()?;
                Ok(Box::new(HttpSource::new(urls.clone())?))
            }
            _ => Err(Error::config("Invalid config for HTTP value source")),
        }
    }
}

/// Register the HTTP value source with a registry
pub fn register(registry: &mut Registry) {
    registry.register_source("http", Box::new(HttpSourceFactory));
}
