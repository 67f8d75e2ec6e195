//! IP-based geolocation over HTTP
//!
//! Discovers the public address from a list of echo services, then asks a
//! lookup endpoint for coordinates. The endpoint URL carries an `{ip}`
//! placeholder; both the ipapi.co and ip-api.com response shapes are read.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use ureq::Agent;

use super::{Geolocator, ObserverLocation};
use crate::error::LocationError;

/// Per-request timeout for every HTTP call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Lookup response fields; each provider fills a different subset.
#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
    city: Option<String>,
    country_name: Option<String>,
    country: Option<String>,
    /// ipapi.co signals failure with `"error": true`
    #[serde(default)]
    error: bool,
    /// ip-api.com signals failure with `"status": "fail"`
    status: Option<String>,
    reason: Option<String>,
    message: Option<String>,
}

impl LookupResponse {
    fn into_location(self, service: &str) -> Result<ObserverLocation, LocationError> {
        let failure = |reason: String| LocationError::Service {
            service: service.to_string(),
            reason,
        };

        if self.error || self.status.as_deref() == Some("fail") {
            let reason = self
                .reason
                .or(self.message)
                .unwrap_or_else(|| "lookup rejected".to_string());
            return Err(failure(reason));
        }

        let latitude = self
            .latitude
            .or(self.lat)
            .ok_or_else(|| failure("response has no latitude".into()))?;
        let longitude = self
            .longitude
            .or(self.lon)
            .ok_or_else(|| failure("response has no longitude".into()))?;
        let timezone = self
            .timezone
            .ok_or_else(|| failure("response has no timezone".into()))?;

        let city = self.city.unwrap_or_else(|| "Unknown".to_string());
        let country = self
            .country_name
            .or(self.country)
            .unwrap_or_else(|| "Unknown".to_string());

        ObserverLocation::new(format!("{city}, {country}"), latitude, longitude, timezone)
    }
}

pub struct IpGeolocator {
    name: String,
    ip_services: Vec<String>,
    lookup_url: String,
    agent: Agent,
}

impl IpGeolocator {
    pub fn new(name: impl Into<String>, ip_services: Vec<String>, lookup_url: String) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            name: name.into(),
            ip_services,
            lookup_url,
            agent: config.into(),
        }
    }

    fn get(&self, url: &str) -> Result<String, LocationError> {
        self.agent
            .get(url)
            .call()
            .map_err(|e| LocationError::Service {
                service: url.to_string(),
                reason: e.to_string(),
            })?
            .body_mut()
            .read_to_string()
            .map_err(|e| LocationError::Service {
                service: url.to_string(),
                reason: format!("failed to read response body: {e}"),
            })
    }

    /// First echo service that returns a parseable address wins.
    fn public_ip(&self) -> Result<IpAddr, LocationError> {
        for service in &self.ip_services {
            match self.get(service) {
                Ok(body) => match body.trim().parse::<IpAddr>() {
                    Ok(ip) => return Ok(ip),
                    Err(_) => debug!("{service} returned a non-address body"),
                },
                Err(e) => debug!("public address lookup failed: {e}"),
            }
        }
        Err(LocationError::Service {
            service: self.name.clone(),
            reason: "no echo service returned a public address".into(),
        })
    }
}

impl Geolocator for IpGeolocator {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self) -> Result<ObserverLocation, LocationError> {
        let ip = self.public_ip()?;
        debug!("public address {ip}");
        let url = self.lookup_url.replace("{ip}", &ip.to_string());
        let body = self.get(&url)?;
        let response: LookupResponse =
            serde_json::from_str(&body).map_err(|e| LocationError::Service {
                service: self.name.clone(),
                reason: format!("malformed lookup response: {e}"),
            })?;
        response.into_location(&self.name)
    }
}
