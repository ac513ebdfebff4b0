//! Organization domain model.
//!
//! The organization is the tenant boundary: every other record carries an
//! `organization_id` and is only reachable through queries filtered by the
//! requesting user's organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Model;
use crate::validation::ValidationErrors;

/// Default lifetime of API tokens issued to an organization's users.
pub const DEFAULT_TOKEN_EXPIRATION_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationType {
    #[default]
    Asset,
    Brokerage,
    Both,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Asset => "ASSET",
            OrganizationType::Brokerage => "BROKERAGE",
            OrganizationType::Both => "BOTH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ASSET" => Some(OrganizationType::Asset),
            "BROKERAGE" => Some(OrganizationType::Brokerage),
            "BOTH" => Some(OrganizationType::Both),
            _ => None,
        }
    }
}

/// A carrier or brokerage using the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Standard Carrier Alpha Code, unique across the system.
    pub scac_code: String,
    /// US DOT number, if registered.
    pub dot_number: Option<u32>,
    pub org_type: OrganizationType,
    /// IANA timezone name (e.g., `America/New_York`).
    pub timezone: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Lifetime of newly issued API tokens, in days.
    pub token_expiration_days: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub scac_code: String,
    #[serde(default)]
    pub dot_number: Option<u32>,
    #[serde(default)]
    pub org_type: OrganizationType,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub token_expiration_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub scac_code: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub dot_number: Option<Option<u32>>,
    pub org_type: Option<OrganizationType>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub token_expiration_days: Option<u32>,
}

fn default_timezone() -> String {
    "America/New_York".into()
}

fn default_currency() -> String {
    "USD".into()
}

/// Checks shared by create and update.
pub fn validate_scac_code(scac_code: &str, errors: &mut ValidationErrors) {
    let len = scac_code.chars().count();
    if !(2..=4).contains(&len) || !scac_code.chars().all(|c| c.is_ascii_uppercase()) {
        errors.add(
            "scac_code",
            "SCAC code must be 2 to 4 uppercase letters.",
        );
    }
}

/// Longest token lifetime an organization may configure.
pub const MAX_TOKEN_EXPIRATION_DAYS: u32 = 3650;

pub fn validate_token_expiration_days(days: u32, errors: &mut ValidationErrors) {
    if days == 0 {
        errors.add(
            "token_expiration_days",
            "Token expiration must be at least one day.",
        );
    } else if days > MAX_TOKEN_EXPIRATION_DAYS {
        errors.add(
            "token_expiration_days",
            format!("Token expiration cannot exceed {MAX_TOKEN_EXPIRATION_DAYS} days."),
        );
    }
}

impl CreateOrganization {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        validate_scac_code(&self.scac_code, &mut errors);
        if let Some(days) = self.token_expiration_days {
            validate_token_expiration_days(days, &mut errors);
        }
        errors.into_result()
    }
}

impl UpdateOrganization {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                errors.add("name", "This field may not be blank.");
            }
        }
        if let Some(scac_code) = &self.scac_code {
            validate_scac_code(scac_code, &mut errors);
        }
        if let Some(days) = self.token_expiration_days {
            validate_token_expiration_days(days, &mut errors);
        }
        errors.into_result()
    }
}

/// A terminal or yard belonging to an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address_line_1: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

impl Model for Depot {
    const TABLE: &'static str = "depot";
    const PATH: &'static str = "depots";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "description",
        "address_line_1",
        "city",
        "state",
        "zip_code",
    ];

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

    fn create_input(scac: &str) -> CreateOrganization {
        CreateOrganization {
            name: "Acme Freight".into(),
            scac_code: scac.into(),
            dot_number: None,
            org_type: OrganizationType::Asset,
            timezone: default_timezone(),
            currency: default_currency(),
            token_expiration_days: None,
        }
    }

    #[test]
    fn scac_code_must_be_uppercase_letters() {
        assert!(create_input("ACME").validate().is_ok());
        assert!(create_input("acme").validate().is_err());
        assert!(create_input("A").validate().is_err());
        assert!(create_input("ACMEX").validate().is_err());
    }

    #[test]
    fn zero_token_expiration_is_rejected() {
        let update = UpdateOrganization {
            token_expiration_days: Some(0),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.contains("token_expiration_days"));
    }

    #[test]
    fn token_expiration_is_capped() {
        let at_cap = UpdateOrganization {
            token_expiration_days: Some(MAX_TOKEN_EXPIRATION_DAYS),
            ..Default::default()
        };
        assert!(at_cap.validate().is_ok());

        let huge = UpdateOrganization {
            token_expiration_days: Some(4_000_000_000),
            ..Default::default()
        };
        assert!(huge.validate().unwrap_err().contains("token_expiration_days"));
    }

    #[test]
    fn org_type_roundtrips_through_storage_strings() {
        for t in [
            OrganizationType::Asset,
            OrganizationType::Brokerage,
            OrganizationType::Both,
        ] {
            assert_eq!(OrganizationType::parse(t.as_str()), Some(t));
        }
        assert_eq!(OrganizationType::parse("asset"), None);
    }

    #[test]
    fn create_defaults_apply_on_deserialize() {
        let input: CreateOrganization =
            serde_json::from_value(serde_json::json!({"name": "A", "scac_code": "AB"})).unwrap();
        assert_eq!(input.currency, "USD");
        assert_eq!(input.org_type, OrganizationType::Asset);
        assert!(input.token_expiration_days.is_none());
    }

    #[test]
    fn depot_fields_match_struct() {
        assert_fields(&Depot {
            name: "Main".into(),
            description: String::new(),
            address_line_1: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
        });
    }
}
