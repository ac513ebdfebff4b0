//! Equipment domain models: equipment types, manufacturers, maintenance
//! plans, tractors and trailers.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForeignKey, Model, default_true};
use crate::validation::ValidationErrors;

pub const VIN_LENGTH: usize = 17;
pub const EARLIEST_MODEL_YEAR: i32 = 1900;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentClass {
    #[default]
    Undefined,
    Car,
    Van,
    Pickup,
    Straight,
    Tractor,
    Trailer,
    Container,
    Chassis,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub equipment_class: EquipmentClass,
    #[serde(default)]
    pub cost_per_mile: Decimal,
    #[serde(default)]
    pub fixed_cost: Decimal,
    #[serde(default)]
    pub exempt_from_tolls: bool,
}

impl Model for EquipmentType {
    const TABLE: &'static str = "equipment_type";
    const PATH: &'static str = "equipment_types";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "description",
        "equipment_class",
        "cost_per_mile",
        "fixed_cost",
        "exempt_from_tolls",
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        if self.cost_per_mile.is_sign_negative() {
            errors.add("cost_per_mile", "Ensure this value is greater than or equal to 0.");
        }
        if self.fixed_cost.is_sign_negative() {
            errors.add("fixed_cost", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result()
    }
}

/// VINs are 17 characters and never contain I, O or Q. An empty VIN is
/// allowed.
fn validate_vin(vin: &str, errors: &mut ValidationErrors) {
    if vin.is_empty() {
        return;
    }
    let valid = vin.len() == VIN_LENGTH
        && vin
            .chars()
            .all(|c| c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q')));
    if !valid {
        errors.add(
            "vin_number",
            "VIN must be 17 characters and may not contain I, O or Q.",
        );
    }
}

fn validate_model_year(year: Option<i32>, errors: &mut ValidationErrors) {
    let Some(year) = year else { return };
    let latest = Utc::now().year() + 1;
    if !(EARLIEST_MODEL_YEAR..=latest).contains(&year) {
        errors.add(
            "model_year",
            format!("Model year must be between {EARLIEST_MODEL_YEAR} and {latest}."),
        );
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    #[default]
    Available,
    OutOfService,
    AtMaintenance,
    Sold,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tractor {
    pub code: String,
    pub equipment_type_id: Uuid,
    #[serde(default)]
    pub status: EquipmentStatus,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license_plate_number: String,
    #[serde(default)]
    pub vin_number: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub model_year: Option<i32>,
    #[serde(default)]
    pub leased: bool,
    #[serde(default)]
    pub leased_date: Option<NaiveDate>,
    #[serde(default)]
    pub fleet_code_id: Option<Uuid>,
    #[serde(default)]
    pub primary_worker_id: Option<Uuid>,
    #[serde(default)]
    pub owner_operated: bool,
}

impl Model for Tractor {
    const TABLE: &'static str = "tractor";
    const PATH: &'static str = "tractors";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "equipment_type_id",
        "status",
        "is_active",
        "description",
        "license_plate_number",
        "vin_number",
        "model",
        "model_year",
        "leased",
        "leased_date",
        "fleet_code_id",
        "primary_worker_id",
        "owner_operated",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("equipment_type_id", EquipmentType::TABLE),
        ForeignKey::protect("fleet_code_id", "fleet_code"),
        ForeignKey::protect("primary_worker_id", "worker"),
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.trim().is_empty() {
            errors.add("code", "This field may not be blank.");
        }
        validate_vin(&self.vin_number, &mut errors);
        validate_model_year(self.model_year, &mut errors);
        if self.leased_date.is_some() && !self.leased {
            errors.add("leased_date", "Leased date requires the tractor to be leased.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    pub code: String,
    pub equipment_type_id: Uuid,
    #[serde(default)]
    pub status: EquipmentStatus,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub vin_number: String,
    #[serde(default)]
    pub model_year: Option<i32>,
    #[serde(default)]
    pub license_plate_number: String,
    #[serde(default)]
    pub license_plate_state: String,
    #[serde(default)]
    pub last_inspection: Option<NaiveDate>,
    #[serde(default)]
    pub fleet_code_id: Option<Uuid>,
}

impl Model for Trailer {
    const TABLE: &'static str = "trailer";
    const PATH: &'static str = "trailers";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "equipment_type_id",
        "status",
        "is_active",
        "vin_number",
        "model_year",
        "license_plate_number",
        "license_plate_state",
        "last_inspection",
        "fleet_code_id",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("equipment_type_id", EquipmentType::TABLE),
        ForeignKey::protect("fleet_code_id", "fleet_code"),
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.trim().is_empty() {
            errors.add("code", "This field may not be blank.");
        }
        validate_vin(&self.vin_number, &mut errors);
        validate_model_year(self.model_year, &mut errors);
        if let Some(date) = self.last_inspection {
            if date > Utc::now().date_naive() {
                errors.add("last_inspection", "Last inspection cannot be in the future.");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentManufacturer {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Model for EquipmentManufacturer {
    const TABLE: &'static str = "equipment_manufacturer";
    const PATH: &'static str = "equipment_manufacturers";
    const FIELDS: &'static [&'static str] = &["name", "description"];
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() || self.name.chars().count() > 50 {
            errors.add("name", "Name must be 1 to 50 characters.");
        }
        errors.into_result()
    }
}

/// Service intervals for a set of equipment types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentMaintenancePlan {
    pub name: String,
    #[serde(default)]
    pub equipment_type_ids: Vec<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub by_distance: bool,
    #[serde(default)]
    pub by_time: bool,
    #[serde(default)]
    pub by_engine_hours: bool,
    #[serde(default)]
    pub miles: Option<u32>,
    #[serde(default)]
    pub months: Option<u32>,
    #[serde(default)]
    pub engine_hours: Option<u32>,
}

impl Model for EquipmentMaintenancePlan {
    const TABLE: &'static str = "equipment_maintenance_plan";
    const PATH: &'static str = "equipment_maintenance_plans";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "equipment_type_ids",
        "description",
        "by_distance",
        "by_time",
        "by_engine_hours",
        "miles",
        "months",
        "engine_hours",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] =
        &[ForeignKey::protect("equipment_type_ids", EquipmentType::TABLE).many()];
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        if !(self.by_distance || self.by_time || self.by_engine_hours) {
            errors.add(
                "by_distance",
                "At least one of by distance, by time or by engine hours must be selected.",
            );
        }
        for (enabled, field, value) in [
            (self.by_distance, "miles", self.miles),
            (self.by_time, "months", self.months),
            (self.by_engine_hours, "engine_hours", self.engine_hours),
        ] {
            if enabled && value.is_none_or(|v| v == 0) {
                errors.add(field, "This field is required for the selected interval.");
            }
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::test_support::assert_fields;

    fn tractor(vin: &str, year: Option<i32>) -> Tractor {
        serde_json::from_value(json!({
            "code": "T100",
            "equipment_type_id": Uuid::new_v4(),
            "vin_number": vin,
            "model_year": year,
        }))
        .unwrap()
    }

    #[test]
    fn vin_must_be_seventeen_valid_characters() {
        assert!(tractor("1FUJGLDR12LM12345", None).validate().is_ok());
        assert!(tractor("", None).validate().is_ok());
        assert!(tractor("1FUJGLDR12LM1234", None).validate().is_err());
        assert!(tractor("1FUJGLDR12LM1234O", None).validate().is_err());
    }

    #[test]
    fn model_year_range() {
        assert!(tractor("", Some(2020)).validate().is_ok());
        let errors = tractor("", Some(1850)).validate().unwrap_err();
        assert!(errors.contains("model_year"));
        let next_next = Utc::now().year() + 2;
        assert!(tractor("", Some(next_next)).validate().is_err());
    }

    #[test]
    fn tractor_references_include_optional_links() {
        let mut t = tractor("", None);
        assert_eq!(t.references().len(), 1);
        t.fleet_code_id = Some(Uuid::new_v4());
        let refs = t.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].table, "fleet_code");
    }

    #[test]
    fn negative_costs_are_rejected() {
        let et: EquipmentType =
            serde_json::from_value(json!({"name": "Reefer", "cost_per_mile": "-1.00"})).unwrap();
        assert!(et.validate().unwrap_err().contains("cost_per_mile"));
    }

    #[test]
    fn fields_match_structs() {
        assert_fields(&tractor("", None));
        assert_fields(
            &serde_json::from_value::<Trailer>(json!({
                "code": "TR1",
                "equipment_type_id": Uuid::new_v4(),
            }))
            .unwrap(),
        );
        assert_fields(
            &serde_json::from_value::<EquipmentType>(json!({"name": "Dry Van"})).unwrap(),
        );
    }

    #[test]
    fn manufacturer_names_are_bounded() {
        let mut maker: EquipmentManufacturer =
            serde_json::from_value(json!({"name": "Freightliner"})).unwrap();
        assert_fields(&maker);
        assert!(maker.validate().is_ok());
        maker.name = "x".repeat(51);
        assert!(maker.validate().unwrap_err().contains("name"));
    }

    #[test]
    fn maintenance_plans_need_an_interval() {
        let mut plan: EquipmentMaintenancePlan = serde_json::from_value(json!({
            "name": "PM-A",
            "equipment_type_ids": [Uuid::new_v4(), Uuid::new_v4()],
        }))
        .unwrap();
        assert_fields(&plan);
        assert_eq!(plan.references().len(), 2);
        assert!(plan.validate().unwrap_err().contains("by_distance"));

        plan.by_distance = true;
        plan.by_time = true;
        let errors = plan.validate().unwrap_err();
        assert!(errors.contains("miles"));
        assert!(errors.contains("months"));
        assert!(!errors.contains("engine_hours"));

        plan.miles = Some(25_000);
        plan.months = Some(6);
        assert!(plan.validate().is_ok());
    }
}
