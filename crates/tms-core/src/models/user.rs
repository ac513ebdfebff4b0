//! User domain model and job titles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Model;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Unique across all organizations; used to log in.
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title_id: Option<Uuid>,
    pub is_active: bool,
    /// Staff users may manage users, controls and the organization itself.
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub organization_id: Uuid,
    pub username: String,
    pub email: String,
    /// Raw password (will be hashed with Argon2id before storage).
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub job_title_id: Option<Uuid>,
    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub job_title_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

fn validate_email(email: &str, errors: &mut ValidationErrors) {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.add("email", "Enter a valid email address.");
    }
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "This field may not be blank.");
        } else if self.username.chars().any(char::is_whitespace) {
            errors.add("username", "Username may not contain whitespace.");
        }
        validate_email(&self.email, &mut errors);
        errors.into_result()
    }
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(email) = &self.email {
            validate_email(email, &mut errors);
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobFunction {
    Manager,
    ManagementTrainee,
    Supervisor,
    Dispatcher,
    Billing,
    Finance,
    Safety,
    SysAdmin,
    #[default]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTitle {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "crate::models::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub job_function: JobFunction,
}

impl Model for JobTitle {
    const TABLE: &'static str = "job_title";
    const PATH: &'static str = "job_titles";
    const FIELDS: &'static [&'static str] = &["name", "description", "is_active", "job_function"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::assert_fields;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            username: "dispatch1".into(),
            email: "d@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: "Dana".into(),
            last_name: "Reyes".into(),
            job_title_id: None,
            is_active: true,
            is_staff: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "dispatch1");
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let mut user = sample_user();
        assert_eq!(user.full_name(), "Dana Reyes");
        user.last_name.clear();
        assert_eq!(user.full_name(), "Dana");
    }

    #[test]
    fn create_user_validation() {
        let input = CreateUser {
            organization_id: Uuid::new_v4(),
            username: "bad name".into(),
            email: "not-an-email".into(),
            password: "password123".into(),
            first_name: String::new(),
            last_name: String::new(),
            job_title_id: None,
            is_staff: false,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.contains("username"));
        assert!(errors.contains("email"));
    }

    #[test]
    fn job_title_fields_match_struct() {
        let title: JobTitle = serde_json::from_value(serde_json::json!({"name": "Dispatcher"})).unwrap();
        assert!(title.is_active);
        assert_eq!(title.job_function, JobFunction::Other);
        assert_fields(&title);
    }
}
