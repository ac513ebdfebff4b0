//! Google Distance Matrix client.

use reqwest::Client;
use serde::Deserialize;
use tms_core::models::route::DistanceUnit;
use tracing::debug;

use crate::error::DispatchError;

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Distance between two addresses as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceResult {
    /// Distance in the requested unit.
    pub distance: f64,
    /// Travel time in minutes.
    pub duration_minutes: Option<f64>,
}

/// An external source of road distances between addresses.
pub trait DistanceProvider: Send + Sync {
    fn distance(
        &self,
        origin: &str,
        destination: &str,
        unit: DistanceUnit,
    ) -> impl Future<Output = Result<DistanceResult, DispatchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64,
}

/// Read the single origin/destination element out of a matrix response.
fn parse_response(response: MatrixResponse, unit: DistanceUnit) -> Result<DistanceResult, DispatchError> {
    if response.status != "OK" {
        return Err(DispatchError::Api {
            status: response.status,
            message: response.error_message.unwrap_or_default(),
        });
    }

    let element = response
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| DispatchError::InvalidResponse("empty distance matrix".into()))?;

    if element.status != "OK" {
        return Err(DispatchError::Api {
            status: element.status,
            message: "no route between the given addresses".into(),
        });
    }

    let meters = element
        .distance
        .ok_or_else(|| DispatchError::InvalidResponse("element has no distance".into()))?
        .value;

    Ok(DistanceResult {
        distance: unit.from_meters(meters),
        duration_minutes: element.duration.map(|d| d.value / 60.0),
    })
}

/// HTTP client for the Google Distance Matrix API.
#[derive(Debug, Clone)]
pub struct GoogleDistanceMatrix {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GoogleDistanceMatrix {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DISTANCE_MATRIX_URL.into(),
        }
    }

    /// Point the client at a different endpoint (e.g. a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl DistanceProvider for GoogleDistanceMatrix {
    async fn distance(
        &self,
        origin: &str,
        destination: &str,
        unit: DistanceUnit,
    ) -> Result<DistanceResult, DispatchError> {
        debug!(origin, destination, "Requesting distance matrix");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("units", unit.as_api_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.to_string(),
                message: text,
            });
        }

        let parsed: MatrixResponse = response.json().await?;
        parse_response(parsed, unit)
    }
}
