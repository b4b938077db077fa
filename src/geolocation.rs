//! Position acquisition for "search around me".
//!
//! A terminal has no device location API, so the position comes from one of
//! a small set of providers selected at start-up: an IP geolocation lookup,
//! a fixed coordinate from the command line, or none at all (which behaves
//! like a user refusing the permission prompt).

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Deserialize;

use crate::api::Coordinate;

/// Default IP geolocation service.
pub const DEFAULT_IP_LOOKUP_URL: &str = "http://ip-api.com/json";

/// Options for a single position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix that may be returned instead of a fresh one.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    PositionUnavailable,

    #[error("location request timed out")]
    Timeout,

    #[error("unknown geolocation error")]
    Unknown,
}

pub trait Geolocator: Send + Sync + 'static {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<Coordinate, GeolocationError>> + Send;
}

/// Always answers with the same coordinate.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator {
    position: Coordinate,
}

impl FixedGeolocator {
    pub fn new(position: Coordinate) -> Self {
        Self { position }
    }
}

impl Geolocator for FixedGeolocator {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinate, GeolocationError> {
        Ok(self.position)
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Locates the machine through an IP geolocation service.
#[derive(Debug)]
pub struct IpGeolocator {
    http: reqwest::Client,
    url: String,
    last_fix: Mutex<Option<(Instant, Coordinate)>>,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>) -> Result<Self, GeolocationError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|_| GeolocationError::Unknown)?;

        Ok(Self {
            http,
            url: url.into(),
            last_fix: Mutex::new(None),
        })
    }

    fn cached(&self, maximum_age: Duration) -> Option<Coordinate> {
        if maximum_age.is_zero() {
            return None;
        }
        let last_fix = *self.last_fix.lock().ok()?;
        last_fix
            .filter(|(at, _)| at.elapsed() <= maximum_age)
            .map(|(_, position)| position)
    }

    async fn lookup(&self) -> Result<Coordinate, GeolocationError> {
        let response = self.http.get(&self.url).send().await.map_err(|e| {
            warn!("IP geolocation request failed: {}", e);
            GeolocationError::PositionUnavailable
        })?;

        if !response.status().is_success() {
            warn!("IP geolocation returned HTTP {}", response.status());
            return Err(GeolocationError::PositionUnavailable);
        }

        let body: IpLookupResponse = response.json().await.map_err(|e| {
            warn!("IP geolocation response could not be decoded: {}", e);
            GeolocationError::Unknown
        })?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)),
            _ => {
                warn!(
                    "IP geolocation failed: {}",
                    body.message.as_deref().unwrap_or("no position in response")
                );
                Err(GeolocationError::PositionUnavailable)
            }
        }
    }
}

impl Geolocator for IpGeolocator {
    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinate, GeolocationError> {
        if let Some(position) = self.cached(options.maximum_age) {
            debug!("Reusing cached position {}", position);
            return Ok(position);
        }

        if options.enable_high_accuracy {
            debug!("High accuracy requested; IP lookup gives city-level precision");
        }

        let position = tokio::time::timeout(options.timeout, self.lookup())
            .await
            .map_err(|_| GeolocationError::Timeout)??;

        if let Ok(mut guard) = self.last_fix.lock() {
            *guard = Some((Instant::now(), position));
        }
        Ok(position)
    }
}

/// Provider chosen from configuration.
#[derive(Debug)]
pub enum AnyGeolocator {
    Ip(IpGeolocator),
    Fixed(FixedGeolocator),
    Disabled,
}

impl Geolocator for AnyGeolocator {
    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinate, GeolocationError> {
        match self {
            Self::Ip(g) => g.current_position(options).await,
            Self::Fixed(g) => g.current_position(options).await,
            Self::Disabled => Err(GeolocationError::PermissionDenied),
        }
    }
}
