//! Movement domain models: the legs of a shipment and their stops.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::shipment::ShipmentStatus;
use crate::models::{ForeignKey, Model, check_amount};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

/// Name of the per-organization counter behind movement reference numbers.
pub const MOVEMENT_SEQUENCE: &str = "movement";

pub fn format_ref_num(sequence: u64) -> String {
    format!("MOV{sequence:06}")
}

/// Whether a movement or stop in `status` has started.
pub fn is_started(status: ShipmentStatus) -> bool {
    matches!(status, ShipmentStatus::InProgress | ShipmentStatus::Completed)
}

/// One leg of a shipment, driven by up to two workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    /// Assigned on create from the organization's movement sequence.
    #[serde(default)]
    pub ref_num: String,
    #[serde(default)]
    pub status: ShipmentStatus,
    pub shipment_id: Uuid,
    #[serde(default)]
    pub tractor_id: Option<Uuid>,
    #[serde(default)]
    pub primary_worker_id: Option<Uuid>,
    #[serde(default)]
    pub secondary_worker_id: Option<Uuid>,
}

impl Movement {
    /// Assigned workers as `(field, id)`.
    pub fn workers(&self) -> impl Iterator<Item = (&'static str, Uuid)> {
        [
            ("primary_worker_id", self.primary_worker_id),
            ("secondary_worker_id", self.secondary_worker_id),
        ]
        .into_iter()
        .filter_map(|(field, id)| id.map(|id| (field, id)))
    }
}

impl Model for Movement {
    const TABLE: &'static str = "movement";
    const PATH: &'static str = "movements";
    const FIELDS: &'static [&'static str] = &[
        "ref_num",
        "status",
        "shipment_id",
        "tractor_id",
        "primary_worker_id",
        "secondary_worker_id",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("shipment_id", "shipment"),
        ForeignKey::protect("tractor_id", "tractor"),
        ForeignKey::protect("primary_worker_id", "worker"),
        ForeignKey::protect("secondary_worker_id", "worker"),
    ];
    const SEQUENCE: Option<&'static str> = Some(MOVEMENT_SEQUENCE);

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["ref_num"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.primary_worker_id.is_some() && self.primary_worker_id == self.secondary_worker_id {
            errors.add(
                "primary_worker_id",
                "Primary worker cannot be the same as secondary worker.",
            );
        }
        if is_started(self.status)
            && self.primary_worker_id.is_none()
            && self.tractor_id.is_none()
        {
            errors.add(
                "primary_worker_id",
                "Primary worker is required before movement status can be changed to \
                 `In Progress` or `Completed`.",
            );
            errors.add(
                "tractor_id",
                "Tractor is required before movement status can be changed to \
                 `In Progress` or `Completed`.",
            );
        }
        errors.into_result()
    }

    fn assign_sequence(&mut self, value: u64) {
        self.ref_num = format_ref_num(value);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopType {
    #[default]
    Pickup,
    SplitPickup,
    SplitDrop,
    Delivery,
    DropOff,
}

fn default_sequence() -> u32 {
    1
}

/// A pickup or delivery on a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub movement_id: Uuid,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    /// Follows the arrival and departure times on save.
    #[serde(default)]
    pub status: ShipmentStatus,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    #[serde(default)]
    pub stop_type: StopType,
    #[serde(default)]
    pub pieces: u32,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub address_line: String,
    pub appointment_time_window_start: DateTime<Utc>,
    pub appointment_time_window_end: DateTime<Utc>,
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub departure_time: Option<DateTime<Utc>>,
}

impl Stop {
    /// Set the status from the recorded arrival and departure.
    pub fn update_status_from_times(&mut self) {
        self.status = match (self.arrival_time, self.departure_time) {
            (Some(_), Some(_)) => ShipmentStatus::Completed,
            (Some(_), None) => ShipmentStatus::InProgress,
            (None, _) => ShipmentStatus::New,
        };
    }
}

impl Model for Stop {
    const TABLE: &'static str = "stop";
    const PATH: &'static str = "stops";
    const FIELDS: &'static [&'static str] = &[
        "movement_id",
        "location_id",
        "status",
        "sequence",
        "stop_type",
        "pieces",
        "weight",
        "address_line",
        "appointment_time_window_start",
        "appointment_time_window_end",
        "arrival_time",
        "departure_time",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::cascade("movement_id", Movement::TABLE),
        ForeignKey::protect("location_id", "location"),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["status"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.location_id.is_none() && self.address_line.trim().is_empty() {
            errors.add("address_line", "Stop location or address is required.");
        }
        if self.sequence == 0 {
            errors.add("sequence", "Ensure this value is greater than or equal to 1.");
        }
        if self.appointment_time_window_end < self.appointment_time_window_start {
            errors.add(
                "appointment_time_window_end",
                "Appointment window end cannot be before the start.",
            );
        }
        match (self.arrival_time, self.departure_time) {
            (None, Some(_)) => {
                errors.add(
                    "departure_time",
                    "Departure time cannot be set without an arrival time.",
                );
            }
            (Some(arrival), Some(departure)) if departure < arrival => {
                errors.add(
                    "departure_time",
                    "Departure time cannot be before the arrival time.",
                );
            }
            _ => {}
        }
        if self.weight.is_sign_negative() {
            errors.add("weight", "Ensure this value is greater than or equal to 0.");
        }
        check_amount(&mut errors, "weight", self.weight);
        errors.into_result()
    }
}
