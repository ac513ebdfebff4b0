//! Worker (driver) domain models: workers and their profile, contacts,
//! comments and time away.

use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{ForeignKey, Model, default_true};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

/// Minimum age, in years, of a worker.
pub const MINIMUM_WORKER_AGE: u32 = 18;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerType {
    #[default]
    Employee,
    Contractor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Endorsement {
    #[default]
    None,
    Hazmat,
    Tanker,
    TankerHazmat,
}

impl Endorsement {
    pub fn includes_hazmat(&self) -> bool {
        matches!(self, Endorsement::Hazmat | Endorsement::TankerHazmat)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub code: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub worker_type: WorkerType,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub address_line_1: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub depot_id: Option<Uuid>,
    #[serde(default)]
    pub fleet_code_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub license_number: String,
    #[serde(default)]
    pub license_state: String,
    #[serde(default)]
    pub license_expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub endorsements: Endorsement,
    #[serde(default)]
    pub hazmat_expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
}

impl Worker {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Model for Worker {
    const TABLE: &'static str = "worker";
    const PATH: &'static str = "workers";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "is_active",
        "worker_type",
        "first_name",
        "last_name",
        "address_line_1",
        "city",
        "state",
        "zip_code",
        "depot_id",
        "fleet_code_id",
        "manager_id",
        "date_of_birth",
        "license_number",
        "license_state",
        "license_expiration_date",
        "endorsements",
        "hazmat_expiration_date",
        "hire_date",
        "termination_date",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("depot_id", "depot"),
        ForeignKey::protect("fleet_code_id", "fleet_code"),
        ForeignKey::protect("manager_id", Self::TABLE),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            extra_fields: &["full_name"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.trim().is_empty() || self.code.chars().count() > 10 {
            errors.add("code", "Code must be 1 to 10 characters.");
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.trim().is_empty() {
                errors.add(field, "This field may not be blank.");
            }
        }

        if let Some(dob) = self.date_of_birth {
            let today = Utc::now().date_naive();
            let adult_from = dob.checked_add_months(Months::new(MINIMUM_WORKER_AGE * 12));
            if adult_from.is_none_or(|d| d > today) {
                errors.add(
                    "date_of_birth",
                    format!("Worker must be at least {MINIMUM_WORKER_AGE} years old."),
                );
            }
        }

        if !self.license_number.is_empty() {
            if self.license_state.is_empty() {
                errors.add("license_state", "License state is required with a license number.");
            }
            if self.license_expiration_date.is_none() {
                errors.add(
                    "license_expiration_date",
                    "License expiration date is required with a license number.",
                );
            }
        }

        if self.endorsements.includes_hazmat() && self.hazmat_expiration_date.is_none() {
            errors.add(
                "hazmat_expiration_date",
                "Hazmat expiration date is required for this endorsement.",
            );
        }

        if let (Some(hire), Some(term)) = (self.hire_date, self.termination_date) {
            if term < hire {
                errors.add(
                    "termination_date",
                    "Termination date cannot be before the hire date.",
                );
            }
        }

        errors.into_result()
    }

    fn computed_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("full_name".into(), Value::String(self.full_name()));
        map
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    Male,
    Female,
    NonBinary,
    #[default]
    Other,
}

/// Compliance dates kept alongside a worker's license data; one per worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub worker_id: Uuid,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub hm_126_expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub review_date: Option<NaiveDate>,
    #[serde(default)]
    pub physical_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub mvr_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub medical_cert_date: Option<NaiveDate>,
}

impl WorkerProfile {
    /// Why the profile keeps the worker off a movement on `today`, if it does.
    pub fn lapsed(&self, today: NaiveDate) -> Option<&'static str> {
        let expired = |date: Option<NaiveDate>| date.is_some_and(|d| d < today);
        if expired(self.physical_due_date) {
            Some("Cannot assign a worker with an expired physical.")
        } else if expired(self.medical_cert_date) {
            Some("Cannot assign a worker with an expired medical certificate.")
        } else if expired(self.mvr_due_date) {
            Some("Cannot assign a worker with an expired MVR.")
        } else {
            None
        }
    }
}

impl Model for WorkerProfile {
    const TABLE: &'static str = "worker_profile";
    const PATH: &'static str = "worker_profiles";
    const FIELDS: &'static [&'static str] = &[
        "worker_id",
        "race",
        "sex",
        "hm_126_expiration_date",
        "review_date",
        "physical_due_date",
        "mvr_due_date",
        "medical_cert_date",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::cascade("worker_id", Worker::TABLE)];
    const UNIQUE_FIELDS: &'static [&'static str] = &["worker_id"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.race.chars().count() > 100 {
            errors.add("race", "Ensure this field has no more than 100 characters.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerContact {
    pub worker_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone: Option<u64>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub mobile_phone: Option<u64>,
}

/// Phone numbers are stored as ten digits without punctuation.
const PHONE_NUMBERS: std::ops::RangeInclusive<u64> = 1_000_000_000..=9_999_999_999;

impl Model for WorkerContact {
    const TABLE: &'static str = "worker_contact";
    const PATH: &'static str = "worker_contacts";
    const FIELDS: &'static [&'static str] = &[
        "worker_id",
        "name",
        "phone",
        "email",
        "relationship",
        "is_primary",
        "mobile_phone",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::cascade("worker_id", Worker::TABLE)];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        for (field, phone) in [("phone", self.phone), ("mobile_phone", self.mobile_phone)] {
            if phone.is_some_and(|number| !PHONE_NUMBERS.contains(&number)) {
                errors.add(field, "Phone number must be 10 digits.");
            }
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerComment {
    pub worker_id: Uuid,
    pub comment_type_id: Uuid,
    pub comment: String,
    /// Set to the author on create.
    #[serde(default)]
    pub entered_by_id: Option<Uuid>,
}

impl Model for WorkerComment {
    const TABLE: &'static str = "worker_comment";
    const PATH: &'static str = "worker_comments";
    const FIELDS: &'static [&'static str] =
        &["worker_id", "comment_type_id", "comment", "entered_by_id"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::cascade("worker_id", Worker::TABLE),
        ForeignKey::protect("comment_type_id", "comment_type"),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["entered_by_id"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.comment.trim().is_empty() {
            errors.add("comment", "This field may not be blank.");
        }
        errors.into_result()
    }

    fn set_entered_by(&mut self, user_id: Uuid) {
        self.entered_by_id = Some(user_id);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    #[default]
    Vac,
    Pers,
    Hol,
    Sick,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTimeAway {
    pub worker_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub leave_type: LeaveType,
}

impl WorkerTimeAway {
    pub fn covers(&self, day: NaiveDate) -> bool {
        (self.start_date..=self.end_date).contains(&day)
    }
}

impl Model for WorkerTimeAway {
    const TABLE: &'static str = "worker_time_away";
    const PATH: &'static str = "worker_time_away";
    const FIELDS: &'static [&'static str] = &["worker_id", "start_date", "end_date", "leave_type"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::cascade("worker_id", Worker::TABLE)];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.end_date < self.start_date {
            errors.add("end_date", "End date cannot be before the start date.");
        }
        errors.into_result()
    }
}
