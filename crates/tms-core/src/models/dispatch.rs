//! Dispatch domain models: comment types, delay codes, fleet codes and
//! rates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForeignKey, Model, default_true};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentType {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Model for CommentType {
    const TABLE: &'static str = "comment_type";
    const PATH: &'static str = "comment_types";
    const FIELDS: &'static [&'static str] = &["name", "description"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayCode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    /// Delay attributable to the carrier or driver.
    #[serde(default)]
    pub f_carrier_or_driver: bool,
}

impl Model for DelayCode {
    const TABLE: &'static str = "delay_code";
    const PATH: &'static str = "delay_codes";
    const FIELDS: &'static [&'static str] = &["code", "description", "f_carrier_or_driver"];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.is_empty() || self.code.chars().count() > 4 {
            errors.add("code", "Code must be 1 to 4 characters.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetCode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub revenue_goal: Decimal,
    #[serde(default)]
    pub deadhead_goal: Decimal,
    #[serde(default)]
    pub mileage_goal: Decimal,
}

impl Model for FleetCode {
    const TABLE: &'static str = "fleet_code";
    const PATH: &'static str = "fleet_codes";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "description",
        "is_active",
        "revenue_goal",
        "deadhead_goal",
        "mileage_goal",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.is_empty() || self.code.chars().count() > 10 {
            errors.add("code", "Code must be 1 to 10 characters.");
        }
        for (field, value) in [
            ("revenue_goal", self.revenue_goal),
            ("deadhead_goal", self.deadhead_goal),
            ("mileage_goal", self.mileage_goal),
        ] {
            if value.is_sign_negative() {
                errors.add(field, "Ensure this value is greater than or equal to 0.");
            }
        }
        errors.into_result()
    }
}

/// A contracted rate between two locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    /// Assigned on create as `R00001`, `R00002`, ...
    #[serde(default)]
    pub rate_number: String,
    pub effective_date: NaiveDate,
    pub expiration_date: NaiveDate,
    #[serde(default)]
    pub shipment_type_id: Option<Uuid>,
    #[serde(default)]
    pub equipment_type_id: Option<Uuid>,
    #[serde(default)]
    pub commodity_id: Option<Uuid>,
    #[serde(default)]
    pub origin_location_id: Option<Uuid>,
    #[serde(default)]
    pub destination_location_id: Option<Uuid>,
    #[serde(default)]
    pub rate_amount: Decimal,
    #[serde(default)]
    pub distance_override: Option<f64>,
    #[serde(default)]
    pub comments: String,
}

impl Model for Rate {
    const TABLE: &'static str = "rate";
    const PATH: &'static str = "rates";
    const FIELDS: &'static [&'static str] = &[
        "rate_number",
        "effective_date",
        "expiration_date",
        "shipment_type_id",
        "equipment_type_id",
        "commodity_id",
        "origin_location_id",
        "destination_location_id",
        "rate_amount",
        "distance_override",
        "comments",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("shipment_type_id", "shipment_type"),
        ForeignKey::protect("equipment_type_id", "equipment_type"),
        ForeignKey::protect("commodity_id", "commodity"),
        ForeignKey::protect("origin_location_id", "location"),
        ForeignKey::protect("destination_location_id", "location"),
    ];
    const SEQUENCE: Option<&'static str> = Some("rate");

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["rate_number"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.expiration_date < self.effective_date {
            errors.add(
                "expiration_date",
                "Expiration date must be after effective date.",
            );
        }
        if self.rate_amount.is_sign_negative() {
            errors.add("rate_amount", "Ensure this value is greater than or equal to 0.");
        }
        if self.distance_override.is_some_and(|d| d < 0.0) {
            errors.add(
                "distance_override",
                "Ensure this value is greater than or equal to 0.",
            );
        }
        errors.into_result()
    }

    fn assign_sequence(&mut self, value: u64) {
        self.rate_number = format!("R{value:05}");
    }
}
