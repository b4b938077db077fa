use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of stations requested per search.
pub const DEFAULT_LIMIT: u32 = 50;

const NEARBY_PATH: &str = "/api/nearby";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Origin and radius of one search attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRequest {
    pub origin: Coordinate,
    pub radius_km: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "StationRecord")]
pub struct Station {
    pub id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub address: Option<String>,
    pub location: Coordinate,
    pub distance_km: f64,
}

impl Station {
    pub fn display_name(&self) -> &str {
        non_empty(&self.name).unwrap_or("Unknown Station")
    }

    pub fn display_brand(&self) -> &str {
        non_empty(&self.brand).unwrap_or("N/A")
    }

    pub fn display_address(&self) -> &str {
        non_empty(&self.address).unwrap_or("Address not available")
    }

    pub fn distance_label(&self) -> String {
        format!("{:.2} km away", self.distance_km)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Wire shape of one element of the `/api/nearby` response.
#[derive(Debug, Deserialize)]
struct StationRecord {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    address: Option<String>,
    lat: f64,
    lon: f64,
    distance_km: f64,
}

impl From<StationRecord> for Station {
    fn from(record: StationRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            brand: record.brand,
            address: record.address,
            location: Coordinate::new(record.lat, record.lon),
            distance_km: record.distance_km,
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Ok(s),
        StringOrNumber::Number(n) => Ok(n.to_string()),
    }
}

/// Errors that can occur while querying the nearby endpoint.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The exchange could not be completed (connectivity, timeout).
    #[error("network error: {message}")]
    Network { message: String },

    /// The service answered with a non-success status.
    #[error("service error: HTTP {status}")]
    Service { status: u16 },

    /// The response body was not a list of stations.
    #[error("decode error: {message}")]
    Decode { message: String },
}

impl QueryError {
    fn network(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Source of nearby stations for a search origin.
pub trait StationQuery: Send + Sync + 'static {
    fn query(
        &self,
        origin: Coordinate,
        radius_km: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Station>, QueryError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the endpoint path is appended to
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Serialize)]
struct NearbyParams {
    lat: f64,
    lon: f64,
    km: u32,
    limit: u32,
}

/// HTTP client for the nearby stations endpoint.
#[derive(Debug, Clone)]
pub struct NearbyClient {
    http: reqwest::Client,
    base_url: String,
}

impl NearbyClient {
    pub fn new(config: ClientConfig) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(QueryError::network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, NEARBY_PATH)
    }
}

impl StationQuery for NearbyClient {
    async fn query(
        &self,
        origin: Coordinate,
        radius_km: u32,
        limit: u32,
    ) -> Result<Vec<Station>, QueryError> {
        debug!(
            "Searching for stations at ({}) within {}km...",
            origin, radius_km
        );

        let params = NearbyParams {
            lat: origin.latitude,
            lon: origin.longitude,
            km: radius_km,
            limit,
        };

        let response = self
            .http
            .get(self.endpoint())
            .query(&params)
            .send()
            .await
            .map_err(QueryError::network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Service {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(QueryError::network)?;
        let stations: Vec<Station> =
            serde_json::from_str(&body).map_err(|e| QueryError::Decode {
                message: e.to_string(),
            })?;

        debug!("Found {} stations", stations.len());
        Ok(stations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves a single canned HTTP response and yields the raw request it received.
    async fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    const TWO_STATIONS: &str = r#"[
        {"id": 17, "name": "Orlen Mokotow", "brand": "Orlen", "address": "Pulawska 1", "lat": 52.19, "lon": 21.02, "distance_km": 1.234},
        {"id": "abc", "name": null, "brand": null, "address": null, "lat": 52.2, "lon": 21.1, "distance_km": 3.5}
    ]"#;

    #[tokio::test]
    async fn query_sends_parameters_and_decodes_stations() {
        let (base_url, server) = serve_once("200 OK", TWO_STATIONS).await;
        let client = NearbyClient::new(ClientConfig::new(base_url)).unwrap();

        let stations = client
            .query(Coordinate::new(52.0, 21.0), 10, DEFAULT_LIMIT)
            .await
            .unwrap();

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /api/nearby?"));
        assert!(request_line.contains("lat=52"));
        assert!(request_line.contains("lon=21"));
        assert!(request_line.contains("km=10"));
        assert!(request_line.contains("limit=50"));

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "17");
        assert_eq!(stations[0].brand.as_deref(), Some("Orlen"));
        assert_eq!(stations[0].location, Coordinate::new(52.19, 21.02));
        assert_eq!(stations[1].id, "abc");
        assert_eq!(stations[1].name, None);
    }

    #[tokio::test]
    async fn empty_list_is_a_success() {
        let (base_url, _server) = serve_once("200 OK", "[]").await;
        let client = NearbyClient::new(ClientConfig::new(base_url)).unwrap();

        let stations = client
            .query(Coordinate::new(52.0, 21.0), 5, DEFAULT_LIMIT)
            .await
            .unwrap();
        assert!(stations.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_a_service_error() {
        let (base_url, _server) = serve_once("503 Service Unavailable", "{}").await;
        let client = NearbyClient::new(ClientConfig::new(base_url)).unwrap();

        let err = client
            .query(Coordinate::new(52.0, 21.0), 10, DEFAULT_LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Service { status: 503 }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let (base_url, _server) = serve_once("200 OK", r#"{"detail": "oops"}"#).await;
        let client = NearbyClient::new(ClientConfig::new(base_url)).unwrap();

        let err = client
            .query(Coordinate::new(52.0, 21.0), 10, DEFAULT_LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::new(format!("http://{}", addr)).with_timeout_secs(2);
        let client = NearbyClient::new(config).unwrap();

        let err = client
            .query(Coordinate::new(52.0, 21.0), 10, DEFAULT_LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Network { .. }));
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let client = NearbyClient::new(ClientConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8000/api/nearby");
    }

    #[test]
    fn display_fallbacks() {
        let station: Station = serde_json::from_str(
            r#"{"id": 1, "name": "", "lat": 1.0, "lon": 2.0, "distance_km": 0.5}"#,
        )
        .unwrap();
        assert_eq!(station.display_name(), "Unknown Station");
        assert_eq!(station.display_brand(), "N/A");
        assert_eq!(station.display_address(), "Address not available");
        assert_eq!(station.distance_label(), "0.50 km away");
    }
}
