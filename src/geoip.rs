//! GeoIP lookup via an ip-api.com compatible HTTP service
//!
//! Lookups are best-effort: loopback and unresolved addresses are never sent
//! out, and any transport or service failure yields "no location" instead of
//! an error.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::GeoIpConfig;
use crate::request::UNKNOWN_IP;

/// Fields requested from the lookup service
const LOOKUP_FIELDS: &str = "status,country,countryCode,region,city,lat,lon,timezone";

/// Addresses that are never looked up
const SKIPPED_IPS: &[&str] = &[UNKNOWN_IP, "127.0.0.1", "::1"];

/// GeoIP lookup result. Either every field is known or there is no location
/// at all.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub country: String,
    pub country_code: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolve an address. `Ok(None)` means the service answered but had no
    /// location for it.
    async fn lookup(&self, ip: &str) -> Result<Option<GeoLocation>>;
}

/// Thread-safe locator handle shared by all requests
pub type SharedGeoLocator = Arc<dyn GeoLocator>;

pub fn should_skip(ip: &str) -> bool {
    SKIPPED_IPS.contains(&ip)
}

/// Look up `ip`, falling back to no location on any failure.
pub async fn locate(locator: &dyn GeoLocator, ip: &str) -> Option<GeoLocation> {
    if should_skip(ip) {
        debug!("Skipping GeoIP lookup for {}", ip);
        return None;
    }

    match locator.lookup(ip).await {
        Ok(location) => location,
        Err(e) => {
            warn!("GeoIP lookup failed for {}: {:#}", ip, e);
            None
        }
    }
}

/// Raw ip-api.com response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    country: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
}

impl IpApiResponse {
    fn into_location(self) -> Option<GeoLocation> {
        if self.status != "success" {
            return None;
        }

        Some(GeoLocation {
            country: self.country?,
            country_code: self.country_code?,
            region: self.region?,
            city: self.city?,
            latitude: self.lat?,
            longitude: self.lon?,
            timezone: self.timezone?,
        })
    }
}

/// Locator backed by ip-api.com (or anything serving the same JSON shape)
pub struct IpApiLocator {
    client: reqwest::Client,
    endpoint: Url,
}

impl IpApiLocator {
    pub fn new(config: &GeoIpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("visitor-analytics/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build GeoIP HTTP client")?;

        let endpoint = Url::parse(config.endpoint.trim())
            .with_context(|| format!("invalid GeoIP endpoint '{}'", config.endpoint))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("GeoIP endpoint '{}' cannot take a path", config.endpoint);
        }

        Ok(Self { client, endpoint })
    }

    /// `{endpoint}/{ip}` with the address percent-encoded as one path segment
    fn lookup_url(&self, ip: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("GeoIP endpoint cannot take a path"))?
            .pop_if_empty()
            .push(ip);
        Ok(url)
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn lookup(&self, ip: &str) -> Result<Option<GeoLocation>> {
        let url = self.lookup_url(ip)?;

        let response: IpApiResponse = self
            .client
            .get(url.clone())
            .query(&[("fields", LOOKUP_FIELDS)])
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?
            .json()
            .await
            .context("malformed GeoIP response")?;

        if response.status != "success" {
            debug!("GeoIP service returned status '{}' for {}", response.status, ip);
        }

        Ok(response.into_location())
    }
}
