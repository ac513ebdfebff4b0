//! Shipment (order) domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForeignKey, Model, amount_fits, amount_too_large, check_amount};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    #[default]
    Active,
    Inactive,
}

fn validate_code(code: &str, max: usize, errors: &mut ValidationErrors) {
    if code.trim().is_empty() || code.chars().count() > max {
        errors.add("code", format!("Code must be 1 to {max} characters."));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentType {
    #[serde(default)]
    pub status: CodeStatus,
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl Model for ShipmentType {
    const TABLE: &'static str = "shipment_type";
    const PATH: &'static str = "shipment_types";
    const FIELDS: &'static [&'static str] = &["status", "code", "description"];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_code(&self.code, 10, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceType {
    #[serde(default)]
    pub status: CodeStatus,
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl Model for ServiceType {
    const TABLE: &'static str = "service_type";
    const PATH: &'static str = "service_types";
    const FIELDS: &'static [&'static str] = &["status", "code", "description"];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_code(&self.code, 10, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commodity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_temp: Option<Decimal>,
    #[serde(default)]
    pub max_temp: Option<Decimal>,
    #[serde(default)]
    pub is_hazmat: bool,
    #[serde(default)]
    pub unit_of_measure: String,
}

impl Model for Commodity {
    const TABLE: &'static str = "commodity";
    const PATH: &'static str = "commodities";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "description",
        "min_temp",
        "max_temp",
        "is_hazmat",
        "unit_of_measure",
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        if let (Some(min), Some(max)) = (self.min_temp, self.max_temp) {
            if max < min {
                errors.add(
                    "max_temp",
                    "Maximum temperature cannot be below the minimum temperature.",
                );
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    #[default]
    New,
    InProgress,
    Completed,
    Hold,
    Billed,
    Voided,
}

impl ShipmentStatus {
    /// Statuses of shipments still being worked.
    pub fn is_open(&self) -> bool {
        matches!(self, ShipmentStatus::New | ShipmentStatus::InProgress)
    }
}

/// How the freight charge is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateMethod {
    #[default]
    Flat,
    PerMile,
    PerStop,
    PerPound,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryMethod {
    #[default]
    Manual,
    Edi,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    /// Assigned on create from the organization's shipment sequence.
    #[serde(default)]
    pub pro_number: String,
    pub customer_id: Uuid,
    pub shipment_type_id: Uuid,
    #[serde(default)]
    pub service_type_id: Option<Uuid>,
    #[serde(default)]
    pub status: ShipmentStatus,
    #[serde(default)]
    pub revenue_code_id: Option<Uuid>,
    #[serde(default)]
    pub origin_location_id: Option<Uuid>,
    #[serde(default)]
    pub origin_address: String,
    pub origin_appointment_window_start: DateTime<Utc>,
    pub origin_appointment_window_end: DateTime<Utc>,
    #[serde(default)]
    pub destination_location_id: Option<Uuid>,
    #[serde(default)]
    pub destination_address: String,
    pub destination_appointment_window_start: DateTime<Utc>,
    pub destination_appointment_window_end: DateTime<Utc>,
    #[serde(default = "default_rating_units")]
    pub rating_units: u32,
    #[serde(default)]
    pub rate_id: Option<Uuid>,
    #[serde(default)]
    pub mileage: Option<f64>,
    /// Sum of the shipment's [`AdditionalCharge`] subtotals.
    #[serde(default)]
    pub other_charge_amount: Decimal,
    #[serde(default)]
    pub freight_charge_amount: Decimal,
    #[serde(default)]
    pub rate_method: RateMethod,
    #[serde(default)]
    pub pieces: u32,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub ready_to_bill: bool,
    #[serde(default)]
    pub bill_date: Option<NaiveDate>,
    #[serde(default)]
    pub ship_date: Option<NaiveDate>,
    #[serde(default)]
    pub billed: bool,
    #[serde(default)]
    pub transferred_to_billing: bool,
    #[serde(default)]
    pub billing_transfer_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sub_total: Decimal,
    #[serde(default)]
    pub equipment_type_id: Option<Uuid>,
    #[serde(default)]
    pub commodity_id: Option<Uuid>,
    #[serde(default)]
    pub entered_by_id: Option<Uuid>,
    #[serde(default)]
    pub temperature_min: Option<Decimal>,
    #[serde(default)]
    pub temperature_max: Option<Decimal>,
    #[serde(default)]
    pub is_hazmat: bool,
    #[serde(default)]
    pub bol_number: String,
    #[serde(default)]
    pub consignee_ref_number: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub voided_comm: String,
    #[serde(default)]
    pub auto_rate: bool,
    #[serde(default)]
    pub entry_method: EntryMethod,
}

fn default_rating_units() -> u32 {
    1
}

impl Shipment {
    /// Freight total for the rate method, plus other charges.
    ///
    /// Fails on `sub_total` when the total does not fit an amount column.
    pub fn calculate_total(&self) -> Result<Decimal, ValidationErrors> {
        let freight = self.freight_charge_amount;
        let base = match self.rate_method {
            RateMethod::Flat | RateMethod::Other => Some(freight),
            RateMethod::PerMile => {
                freight.checked_mul(self.mileage.and_then(Decimal::from_f64).unwrap_or_default())
            }
            RateMethod::PerPound => freight.checked_mul(self.weight),
            RateMethod::PerStop => freight.checked_mul(Decimal::from(self.rating_units)),
        };
        base.and_then(|base| base.checked_add(self.other_charge_amount))
            .map(|total| total.round_dp(2))
            .filter(|total| amount_fits(*total))
            .ok_or_else(|| {
                let mut errors = ValidationErrors::new();
                errors.add("sub_total", amount_too_large());
                errors
            })
    }
}

impl Model for Shipment {
    const TABLE: &'static str = "shipment";
    const PATH: &'static str = "shipments";
    const FIELDS: &'static [&'static str] = &[
        "pro_number",
        "customer_id",
        "shipment_type_id",
        "service_type_id",
        "status",
        "revenue_code_id",
        "origin_location_id",
        "origin_address",
        "origin_appointment_window_start",
        "origin_appointment_window_end",
        "destination_location_id",
        "destination_address",
        "destination_appointment_window_start",
        "destination_appointment_window_end",
        "rating_units",
        "rate_id",
        "mileage",
        "other_charge_amount",
        "freight_charge_amount",
        "rate_method",
        "pieces",
        "weight",
        "ready_to_bill",
        "bill_date",
        "ship_date",
        "billed",
        "transferred_to_billing",
        "billing_transfer_date",
        "sub_total",
        "equipment_type_id",
        "commodity_id",
        "entered_by_id",
        "temperature_min",
        "temperature_max",
        "is_hazmat",
        "bol_number",
        "consignee_ref_number",
        "comment",
        "voided_comm",
        "auto_rate",
        "entry_method",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("customer_id", "customer"),
        ForeignKey::protect("shipment_type_id", ShipmentType::TABLE),
        ForeignKey::protect("service_type_id", ServiceType::TABLE),
        ForeignKey::protect("revenue_code_id", "revenue_code"),
        ForeignKey::protect("origin_location_id", "location"),
        ForeignKey::protect("destination_location_id", "location"),
        ForeignKey::protect("rate_id", "rate"),
        ForeignKey::protect("equipment_type_id", "equipment_type"),
        ForeignKey::protect("commodity_id", Commodity::TABLE),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &[
                "pro_number",
                "entered_by_id",
                "other_charge_amount",
                "sub_total",
                "billed",
                "bill_date",
                "transferred_to_billing",
                "billing_transfer_date",
                "is_hazmat",
            ],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self.rate_method {
            RateMethod::Flat if self.freight_charge_amount.is_zero() => {
                errors.add(
                    "freight_charge_amount",
                    "Rate method is Flat but freight charge amount is not set.",
                );
            }
            RateMethod::PerMile if !self.mileage.is_some_and(|m| m > 0.0) => {
                errors.add("mileage", "Rate method Per Mile requires mileage to be set.");
            }
            RateMethod::PerPound if self.weight < Decimal::ONE => {
                errors.add(
                    "rate_method",
                    "Weight cannot be 0 when the rate method is Per Pound.",
                );
            }
            _ => {}
        }

        if self.mileage.is_some_and(|m| !m.is_finite() || m < 0.0) {
            errors.add("mileage", "Ensure this value is greater than or equal to 0.");
        }
        if self.freight_charge_amount.is_sign_negative() {
            errors.add(
                "freight_charge_amount",
                "Ensure this value is greater than or equal to 0.",
            );
        }
        check_amount(&mut errors, "freight_charge_amount", self.freight_charge_amount);
        check_amount(&mut errors, "weight", self.weight);

        if self.origin_location_id.is_none() && self.origin_address.trim().is_empty() {
            errors.add("origin_address", "Origin location or address is required.");
        }
        if self.destination_location_id.is_none() && self.destination_address.trim().is_empty() {
            errors.add(
                "destination_address",
                "Destination location or address is required.",
            );
        }

        if self.origin_appointment_window_end < self.origin_appointment_window_start {
            errors.add(
                "origin_appointment_window_end",
                "Origin appointment window end cannot be before the start.",
            );
        }
        if self.destination_appointment_window_end < self.destination_appointment_window_start {
            errors.add(
                "destination_appointment_window_end",
                "Destination appointment window end cannot be before the start.",
            );
        }

        if let (Some(min), Some(max)) = (self.temperature_min, self.temperature_max) {
            if max < min {
                errors.add(
                    "temperature_max",
                    "Maximum temperature cannot be below the minimum temperature.",
                );
            }
        }

        errors.into_result()
    }
}

/// An accessorial charge billed on a shipment.
///
/// The amount is copied from the accessorial charge when the row is saved;
/// the shipment's `other_charge_amount` is the sum of its rows' subtotals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub shipment_id: Uuid,
    pub accessorial_charge_id: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub charge_amount: Decimal,
    #[serde(default = "default_rating_units")]
    pub unit: u32,
    #[serde(default)]
    pub sub_total: Decimal,
    #[serde(default)]
    pub entered_by_id: Option<Uuid>,
}

impl AdditionalCharge {
    /// Take the charge amount and recompute the subtotal.
    pub fn apply_amount(&mut self, charge_amount: Decimal) -> Result<(), ValidationErrors> {
        let sub_total = charge_amount
            .checked_mul(Decimal::from(self.unit))
            .map(|total| total.round_dp(2))
            .filter(|total| amount_fits(*total));
        let Some(sub_total) = sub_total else {
            let mut errors = ValidationErrors::new();
            errors.add("unit", amount_too_large());
            return Err(errors);
        };
        self.charge_amount = charge_amount;
        self.sub_total = sub_total;
        Ok(())
    }
}

impl Model for AdditionalCharge {
    const TABLE: &'static str = "additional_charge";
    const PATH: &'static str = "additional_charges";
    const FIELDS: &'static [&'static str] = &[
        "shipment_id",
        "accessorial_charge_id",
        "description",
        "charge_amount",
        "unit",
        "sub_total",
        "entered_by_id",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::cascade("shipment_id", Shipment::TABLE),
        ForeignKey::protect("accessorial_charge_id", "accessorial_charge"),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["charge_amount", "sub_total", "entered_by_id"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.unit == 0 {
            errors.add("unit", "Ensure this value is greater than or equal to 1.");
        }
        errors.into_result()
    }
}

/// Why a shipment was voided or cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCodeType {
    Voided,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonCode {
    #[serde(default)]
    pub status: CodeStatus,
    pub code: String,
    pub code_type: ReasonCodeType,
    pub description: String,
}

impl Model for ReasonCode {
    const TABLE: &'static str = "reason_code";
    const PATH: &'static str = "reason_codes";
    const FIELDS: &'static [&'static str] = &["status", "code", "code_type", "description"];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_code(&self.code, 10, &mut errors);
        if self.description.trim().is_empty() {
            errors.add("description", "This field may not be blank.");
        } else if self.description.chars().count() > 100 {
            errors.add(
                "description",
                "Ensure this field has no more than 100 characters.",
            );
        }
        errors.into_result()
    }
}

#[cfg(test)]
pub(crate) fn sample_shipment() -> Shipment {
    serde_json::from_value(serde_json::json!({
        "customer_id": Uuid::new_v4(),
        "shipment_type_id": Uuid::new_v4(),
        "origin_address": "100 Main St, Houston, TX 77002",
        "destination_address": "1 Elm St, Dallas, TX 75201",
        "origin_appointment_window_start": "2024-03-01T08:00:00Z",
        "origin_appointment_window_end": "2024-03-01T10:00:00Z",
        "destination_appointment_window_start": "2024-03-02T08:00:00Z",
        "destination_appointment_window_end": "2024-03-02T10:00:00Z",
        "freight_charge_amount": "1500.00",
    }))
    .expect("sample shipment")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use super::*;
    use crate::models::test_support::assert_fields;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn sample_is_valid_with_defaults() {
        let s = sample_shipment();
        assert_eq!(s.status, ShipmentStatus::New);
        assert_eq!(s.rate_method, RateMethod::Flat);
        assert_eq!(s.rating_units, 1);
        assert!(s.validate().is_ok());
        assert_fields(&s);
    }

    #[test]
    fn flat_requires_freight_charge() {
        let mut s = sample_shipment();
        s.freight_charge_amount = Decimal::ZERO;
        assert!(s.validate().unwrap_err().contains("freight_charge_amount"));
    }

    #[test]
    fn per_mile_requires_mileage() {
        let mut s = sample_shipment();
        s.rate_method = RateMethod::PerMile;
        assert!(s.validate().unwrap_err().contains("mileage"));
        s.mileage = Some(250.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn per_pound_requires_weight() {
        let mut s = sample_shipment();
        s.rate_method = RateMethod::PerPound;
        assert!(s.validate().unwrap_err().contains("rate_method"));
        s.weight = dec("1200");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn origin_and_destination_need_location_or_address() {
        let mut s = sample_shipment();
        s.origin_address.clear();
        s.destination_address.clear();
        let errors = s.validate().unwrap_err();
        assert!(errors.contains("origin_address"));
        assert!(errors.contains("destination_address"));
        s.origin_location_id = Some(Uuid::new_v4());
        s.destination_location_id = Some(Uuid::new_v4());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn appointment_window_end_before_start() {
        let mut s = sample_shipment();
        s.origin_appointment_window_end =
            s.origin_appointment_window_start - chrono::Duration::hours(1);
        assert!(
            s.validate()
                .unwrap_err()
                .contains("origin_appointment_window_end")
        );
    }

    #[test]
    fn totals_follow_rate_method() {
        let mut s = sample_shipment();
        s.other_charge_amount = dec("100");
        assert_eq!(s.calculate_total().unwrap(), dec("1600.00"));

        s.rate_method = RateMethod::PerMile;
        s.freight_charge_amount = dec("2.50");
        s.mileage = Some(100.0);
        assert_eq!(s.calculate_total().unwrap(), dec("350.00"));

        s.rate_method = RateMethod::PerPound;
        s.freight_charge_amount = dec("0.10");
        s.weight = dec("1000");
        assert_eq!(s.calculate_total().unwrap(), dec("200.00"));

        s.rate_method = RateMethod::PerStop;
        s.freight_charge_amount = dec("75");
        s.rating_units = 3;
        assert_eq!(s.calculate_total().unwrap(), dec("325.00"));
    }

    #[test]
    fn oversized_amounts_are_field_errors() {
        let mut s = sample_shipment();
        s.rate_method = RateMethod::PerPound;
        s.freight_charge_amount = dec("100000000000000000");
        s.weight = dec("100000000000000");
        let errors = s.validate().unwrap_err();
        assert!(errors.contains("freight_charge_amount"));
        assert!(!errors.contains("weight"));

        s.freight_charge_amount = dec("999999999999999");
        s.weight = dec("999999999999999");
        assert!(s.validate().is_ok());
        assert!(s.calculate_total().unwrap_err().contains("sub_total"));
    }

    #[test]
    fn references_skip_missing_links() {
        let mut s = sample_shipment();
        assert_eq!(s.references().len(), 2);
        s.commodity_id = Some(Uuid::new_v4());
        s.origin_location_id = Some(Uuid::new_v4());
        let fields: Vec<_> = s.references().iter().map(|r| r.field).collect();
        assert_eq!(
            fields,
            vec![
                "customer_id",
                "shipment_type_id",
                "origin_location_id",
                "commodity_id"
            ]
        );
    }

    #[test]
    fn only_new_and_in_progress_are_open() {
        assert!(ShipmentStatus::New.is_open());
        assert!(ShipmentStatus::InProgress.is_open());
        assert!(!ShipmentStatus::Completed.is_open());
        assert!(!ShipmentStatus::Voided.is_open());
    }

    #[test]
    fn commodity_temperature_range() {
        let c = Commodity {
            name: "Produce".into(),
            description: String::new(),
            min_temp: Some(dec("40")),
            max_temp: Some(dec("32")),
            is_hazmat: false,
            unit_of_measure: String::new(),
        };
        assert!(c.validate().unwrap_err().contains("max_temp"));
        assert_fields(&c);
    }

    #[test]
    fn additional_charge_subtotal_follows_units() {
        let mut charge: AdditionalCharge = serde_json::from_value(serde_json::json!({
            "shipment_id": Uuid::new_v4(),
            "accessorial_charge_id": Uuid::new_v4(),
            "unit": 3,
            "charge_amount": "999",
        }))
        .unwrap();
        charge.apply_amount(dec("45.50")).unwrap();
        assert_eq!(charge.charge_amount, dec("45.50"));
        assert_eq!(charge.sub_total, dec("136.50"));
        assert_fields(&charge);

        charge.unit = u32::MAX;
        assert!(charge.apply_amount(dec("999999999")).unwrap_err().contains("unit"));
        assert_eq!(charge.sub_total, dec("136.50"));

        charge.unit = 0;
        assert!(charge.validate().unwrap_err().contains("unit"));
    }

    #[test]
    fn reason_code_rules() {
        let code: ReasonCode = serde_json::from_value(serde_json::json!({
            "code": "CUSTCXL",
            "code_type": "CANCELLED",
            "description": "Customer cancelled",
        }))
        .unwrap();
        assert!(code.validate().is_ok());
        assert_fields(&code);

        let blank = ReasonCode {
            code: String::new(),
            description: " ".into(),
            ..code
        };
        let errors = blank.validate().unwrap_err();
        assert!(errors.contains("code"));
        assert!(errors.contains("description"));
    }
}
