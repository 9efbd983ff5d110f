//! Batched distance-matrix client.

use crate::error::{Error, Result};
use crate::models::Coordinate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Status string the API uses for success, both overall and per element
pub const STATUS_OK: &str = "OK";

/// Routing options sent with every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPreferences {
    pub language: String,
    pub units: String,
    pub transit_modes: Vec<String>,
    pub transit_routing_preference: String,
    pub region: String,
}

impl Default for RoutingPreferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            units: "metric".to_string(),
            transit_modes: vec!["bus".to_string(), "rail".to_string()],
            transit_routing_preference: "fewer_transfers".to_string(),
            region: "ie".to_string(),
        }
    }
}

/// Many origins to one destination
#[derive(Debug, Clone)]
pub struct MatrixRequest {
    pub origins: Vec<Coordinate>,
    pub destination: Coordinate,
    pub mode: String,
    pub arrival_time: DateTime<Utc>,
    pub preferences: RoutingPreferences,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    /// One row per origin, in request order
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixRow {
    /// One element per destination
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    pub duration: Option<TextValue>,
    pub distance: Option<TextValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub value: i64,
    pub text: String,
}

/// Quota-limited batched distance lookups
#[async_trait]
pub trait DistanceMatrix: Send + Sync {
    async fn distance_matrix(&self, request: &MatrixRequest) -> Result<MatrixResponse>;
}

/// Google Distance Matrix API client
pub struct GoogleDistanceMatrix {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl GoogleDistanceMatrix {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: DISTANCE_MATRIX_URL.to_string(),
        })
    }

    fn query(&self, request: &MatrixRequest) -> Vec<(&'static str, String)> {
        let prefs = &request.preferences;
        vec![
            (
                "origins",
                request
                    .origins
                    .iter()
                    .map(Coordinate::as_query)
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            ("destinations", request.destination.as_query()),
            ("mode", request.mode.clone()),
            ("arrival_time", request.arrival_time.timestamp().to_string()),
            ("language", prefs.language.clone()),
            ("units", prefs.units.clone()),
            ("transit_mode", prefs.transit_modes.join("|")),
            (
                "transit_routing_preference",
                prefs.transit_routing_preference.clone(),
            ),
            ("region", prefs.region.clone()),
            ("key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl DistanceMatrix for GoogleDistanceMatrix {
    async fn distance_matrix(&self, request: &MatrixRequest) -> Result<MatrixResponse> {
        debug!(
            "Requesting {} origins to {} by {}",
            request.origins.len(),
            request.destination,
            request.mode
        );
        let response = self
            .http
            .get(&self.endpoint)
            .query(&self.query(request))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<MatrixResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_partial_response() {
        let body = r#"{
            "destination_addresses": ["Dublin 2"],
            "origin_addresses": ["A", "B"],
            "rows": [
                {"elements": [{"status": "OK",
                               "duration": {"value": 1520, "text": "25 mins"},
                               "distance": {"value": 6120, "text": "6.1 km"}}]},
                {"elements": [{"status": "ZERO_RESULTS"}]}
            ],
            "status": "OK"
        }"#;
        let parsed: MatrixResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, STATUS_OK);
        assert_eq!(parsed.rows.len(), 2);
        let first = &parsed.rows[0].elements[0];
        assert_eq!(first.duration.as_ref().unwrap().value, 1520);
        assert_eq!(first.distance.as_ref().unwrap().text, "6.1 km");
        assert_eq!(parsed.rows[1].elements[0].status, "ZERO_RESULTS");
        assert!(parsed.rows[1].elements[0].duration.is_none());
    }

    #[test]
    fn deserializes_error_without_rows() {
        let body = r#"{"status": "REQUEST_DENIED", "error_message": "bad key", "rows": []}"#;
        let parsed: MatrixResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "REQUEST_DENIED");
        assert_eq!(parsed.error_message.as_deref(), Some("bad key"));
    }

    #[test]
    fn builds_query_parameters() {
        let client = GoogleDistanceMatrix::new("secret").unwrap();
        let request = MatrixRequest {
            origins: vec![Coordinate::new(53.3, -6.2), Coordinate::new(53.4, -6.1)],
            destination: Coordinate::new(53.34, -6.26),
            mode: "transit".to_string(),
            arrival_time: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            preferences: RoutingPreferences::default(),
        };
        let query = client.query(&request);
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("origins"), "53.3,-6.2|53.4,-6.1");
        assert_eq!(get("destinations"), "53.34,-6.26");
        assert_eq!(get("transit_mode"), "bus|rail");
        assert_eq!(get("arrival_time"), "1705309200");
        assert_eq!(get("key"), "secret");
    }
}
