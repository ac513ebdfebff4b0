//! Location domain models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{ForeignKey, Model};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

impl Model for LocationCategory {
    const TABLE: &'static str = "location_category";
    const PATH: &'static str = "location_categories";
    const FIELDS: &'static [&'static str] = &["name", "description", "color"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        if !self.color.is_empty() && !is_hex_color(&self.color) {
            errors.add("color", "Color must be a hex value such as #1f2937.");
        }
        errors.into_result()
    }
}

fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub status: LocationStatus,
    #[serde(default)]
    pub location_category_id: Option<Uuid>,
    #[serde(default)]
    pub depot_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub is_geocoded: bool,
}

impl Location {
    /// Single-line address used for display and for distance lookups.
    pub fn full_address(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.address_line_1, self.city, self.state, self.zip_code
        )
    }

    /// `(latitude, longitude)` when both are known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

impl Model for Location {
    const TABLE: &'static str = "location";
    const PATH: &'static str = "locations";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "name",
        "status",
        "location_category_id",
        "depot_id",
        "description",
        "address_line_1",
        "address_line_2",
        "city",
        "state",
        "zip_code",
        "latitude",
        "longitude",
        "place_id",
        "is_geocoded",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("location_category_id", LocationCategory::TABLE),
        ForeignKey::protect("depot_id", "depot"),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            extra_fields: &["full_address"],
            read_only_fields: &["is_geocoded"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("code", &self.code),
            ("name", &self.name),
            ("address_line_1", &self.address_line_1),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
        ] {
            if value.trim().is_empty() {
                errors.add(field, "This field may not be blank.");
            }
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                errors.add("latitude", "Latitude must be between -90 and 90.");
            }
        }
        if let Some(lng) = self.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                errors.add("longitude", "Longitude must be between -180 and 180.");
            }
        }
        if self.latitude.is_some() != self.longitude.is_some() {
            errors.add_non_field("Latitude and longitude must be provided together.");
        }
        errors.into_result()
    }

    fn computed_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("full_address".into(), Value::String(self.full_address()));
        map
    }
}

#[cfg(test)]
pub(crate) fn sample_location(lat: Option<f64>, lng: Option<f64>) -> Location {
    Location {
        code: "HOU01".into(),
        name: "Houston Yard".into(),
        status: LocationStatus::Active,
        location_category_id: None,
        depot_id: None,
        description: String::new(),
        address_line_1: "100 Main St".into(),
        address_line_2: String::new(),
        city: "Houston".into(),
        state: "TX".into(),
        zip_code: "77002".into(),
        latitude: lat,
        longitude: lng,
        place_id: String::new(),
        is_geocoded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::assert_fields;

    #[test]
    fn full_address_format() {
        assert_eq!(
            sample_location(None, None).full_address(),
            "100 Main St, Houston, TX 77002"
        );
    }

    #[test]
    fn coordinates_must_be_in_range_and_paired() {
        assert!(sample_location(Some(29.76), Some(-95.37)).validate().is_ok());
        let errors = sample_location(Some(91.0), Some(-95.37)).validate().unwrap_err();
        assert!(errors.contains("latitude"));
        let errors = sample_location(Some(29.76), Some(-181.0)).validate().unwrap_err();
        assert!(errors.contains("longitude"));
        assert!(sample_location(Some(29.76), None).validate().is_err());
    }

    #[test]
    fn coordinates_need_both_values() {
        assert_eq!(
            sample_location(Some(1.0), Some(2.0)).coordinates(),
            Some((1.0, 2.0))
        );
        assert_eq!(sample_location(Some(1.0), None).coordinates(), None);
    }

    #[test]
    fn category_color_must_be_hex() {
        let mut category = LocationCategory {
            name: "Warehouse".into(),
            description: String::new(),
            color: "#00ff00".into(),
        };
        assert!(category.validate().is_ok());
        category.color = "green".into();
        assert!(category.validate().unwrap_err().contains("color"));
        assert_fields(&category);
    }

    #[test]
    fn location_fields_match_struct() {
        assert_fields(&sample_location(None, None));
        assert_eq!(
            sample_location(None, None).computed_fields()["full_address"],
            "100 Main St, Houston, TX 77002"
        );
    }
}
