//! Stored routes between two locations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForeignKey, Model};
use crate::validation::ValidationErrors;

/// How distances between locations are calculated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMethod {
    /// Great-circle distance from stored coordinates.
    #[default]
    Geodesic,
    /// Google Distance Matrix on the full addresses.
    Google,
}

/// Unit mileage is reported in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceUnit {
    /// Miles.
    #[default]
    Imperial,
    /// Kilometers.
    Metric,
}

impl DistanceUnit {
    pub const METERS_PER_MILE: f64 = 1609.344;

    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Imperial => meters / Self::METERS_PER_MILE,
            DistanceUnit::Metric => meters / 1000.0,
        }
    }

    pub fn to_meters(&self, distance: f64) -> f64 {
        match self {
            DistanceUnit::Imperial => distance * Self::METERS_PER_MILE,
            DistanceUnit::Metric => distance * 1000.0,
        }
    }

    /// Re-express `distance`, measured in `self`, in `unit`.
    pub fn convert(&self, distance: f64, unit: DistanceUnit) -> f64 {
        if *self == unit {
            distance
        } else {
            unit.from_meters(self.to_meters(distance))
        }
    }

    /// Unit name as used by the Google Distance Matrix API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            DistanceUnit::Imperial => "imperial",
            DistanceUnit::Metric => "metric",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub origin_location_id: Uuid,
    pub destination_location_id: Uuid,
    pub total_mileage: f64,
    /// Estimated travel time in minutes, when known.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub distance_method: DistanceMethod,
    #[serde(default)]
    pub mileage_unit: DistanceUnit,
}

impl Model for Route {
    const TABLE: &'static str = "route";
    const PATH: &'static str = "routes";
    const FIELDS: &'static [&'static str] = &[
        "origin_location_id",
        "destination_location_id",
        "total_mileage",
        "duration",
        "distance_method",
        "mileage_unit",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::cascade("origin_location_id", "location"),
        ForeignKey::cascade("destination_location_id", "location"),
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.total_mileage.is_finite() || self.total_mileage < 0.0 {
            errors.add(
                "total_mileage",
                "Ensure this value is greater than or equal to 0.",
            );
        }
        if self.duration.is_some_and(|d| !d.is_finite() || d < 0.0) {
            errors.add("duration", "Ensure this value is greater than or equal to 0.");
        }
        if self.origin_location_id == self.destination_location_id {
            errors.add(
                "destination_location_id",
                "Origin and destination locations cannot be the same.",
            );
        }
        errors.into_result()
    }
}
