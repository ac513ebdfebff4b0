//! Customers billed for shipments, their contacts and billing profiles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::shipment::CodeStatus;
use crate::models::{ForeignKey, Model, default_true};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

/// Longest customer code, base letters plus sequence digits.
pub const CUSTOMER_CODE_LENGTH: usize = 10;

/// Digits reserved for the sequence part of a customer code.
const CUSTOMER_CODE_DIGITS: usize = 4;

/// Customer code built from the name and a per-organization sequence.
///
/// Up to five letters or digits of the name, upper-cased, followed by the
/// zero-padded sequence. Base letters are dropped from the end once the
/// sequence outgrows its four digits so the code stays within
/// [`CUSTOMER_CODE_LENGTH`].
pub fn customer_code(name: &str, sequence: u64) -> String {
    let digits = format!("{sequence:0width$}", width = CUSTOMER_CODE_DIGITS);
    let room = CUSTOMER_CODE_LENGTH.saturating_sub(digits.len()).min(5);
    let base: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(room)
        .collect();
    format!("{base}{digits}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub status: CodeStatus,
    /// Generated on create, see [`customer_code`].
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub has_customer_portal: bool,
    #[serde(default)]
    pub auto_mark_ready_to_bill: bool,
}

impl Customer {
    pub fn full_address(&self) -> String {
        [
            self.address_line_1.as_str(),
            self.address_line_2.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.zip_code.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl Model for Customer {
    const TABLE: &'static str = "customer";
    const PATH: &'static str = "customers";
    const FIELDS: &'static [&'static str] = &[
        "status",
        "code",
        "name",
        "address_line_1",
        "address_line_2",
        "city",
        "state",
        "zip_code",
        "has_customer_portal",
        "auto_mark_ready_to_bill",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];
    const SEQUENCE: Option<&'static str> = Some("customer");

    fn field_spec() -> FieldSpec {
        FieldSpec {
            extra_fields: &["full_address"],
            read_only_fields: &["code"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        } else if !self.name.chars().any(|c| c.is_ascii_alphanumeric()) {
            errors.add("name", "Name must contain at least one letter or digit.");
        }
        errors.into_result()
    }

    fn assign_sequence(&mut self, value: u64) {
        self.code = customer_code(&self.name, value);
    }

    fn computed_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("full_address".into(), Value::String(self.full_address()));
        map
    }
}

/// Billing criteria for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBillingProfile {
    pub customer_id: Uuid,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Document classes a shipment needs before it can be billed.
    #[serde(default)]
    pub document_classification_ids: Vec<Uuid>,
    #[serde(default)]
    pub email_subject: String,
    #[serde(default)]
    pub email_from_address: String,
    #[serde(default)]
    pub read_receipt: bool,
}

impl Model for CustomerBillingProfile {
    const TABLE: &'static str = "customer_billing_profile";
    const PATH: &'static str = "customer_billing_profiles";
    const FIELDS: &'static [&'static str] = &[
        "customer_id",
        "is_active",
        "document_classification_ids",
        "email_subject",
        "email_from_address",
        "read_receipt",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::cascade("customer_id", Customer::TABLE),
        ForeignKey::protect("document_classification_ids", "document_classification").many(),
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["customer_id"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.email_from_address.is_empty() && !self.email_from_address.contains('@') {
            errors.add("email_from_address", "Enter a valid email address.");
        }
        let mut seen = std::collections::BTreeSet::new();
        if !self.document_classification_ids.iter().all(|id| seen.insert(id)) {
            errors.add(
                "document_classification_ids",
                "Document classifications must not repeat.",
            );
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub customer_id: Uuid,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_payable_contact: bool,
}

impl Model for CustomerContact {
    const TABLE: &'static str = "customer_contact";
    const PATH: &'static str = "customer_contacts";
    const FIELDS: &'static [&'static str] = &[
        "customer_id",
        "is_active",
        "name",
        "email",
        "title",
        "phone",
        "is_payable_contact",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] =
        &[ForeignKey::cascade("customer_id", Customer::TABLE)];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        if self.is_payable_contact && self.email.is_empty() {
            errors.add("email", "Payable contacts must have an email address.");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::test_support::assert_fields;

    fn customer(name: &str) -> Customer {
        serde_json::from_value(json!({"name": name, "city": "Austin", "state": "TX"})).unwrap()
    }

    #[test]
    fn codes_take_five_name_characters() {
        assert_eq!(customer_code("Acme Widgets", 1), "ACMEW0001");
        assert_eq!(customer_code("H-E-B", 12), "HEB0012");
        assert_eq!(customer_code("Globex", 123_456), "GLOB123456");
        assert_eq!(customer_code("Globex", 12_345_678), "GL12345678");
    }

    #[test]
    fn codes_never_exceed_the_column() {
        for sequence in [1, 9_999, 10_000, 999_999, 1_000_000, 99_999_999] {
            let code = customer_code("Initech Holdings", sequence);
            assert!(code.len() <= CUSTOMER_CODE_LENGTH, "{code}");
        }
    }

    #[test]
    fn sequence_sets_the_code() {
        let mut c = customer("Acme");
        c.assign_sequence(7);
        assert_eq!(c.code, "ACME0007");
        assert_fields(&c);
    }

    #[test]
    fn name_needs_a_letter_or_digit() {
        assert!(customer("Acme").validate().is_ok());
        assert!(customer("  ").validate().unwrap_err().contains("name"));
        assert!(customer("--").validate().unwrap_err().contains("name"));
    }

    #[test]
    fn full_address_skips_blank_parts() {
        assert_eq!(customer("Acme").full_address(), "Austin TX");
    }

    #[test]
    fn billing_profile_references_every_document_class() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let profile: CustomerBillingProfile = serde_json::from_value(json!({
            "customer_id": Uuid::new_v4(),
            "document_classification_ids": [first, second],
        }))
        .unwrap();
        assert!(profile.is_active);
        let tables: Vec<_> = profile.references().iter().map(|r| r.table).collect();
        assert_eq!(
            tables,
            vec!["customer", "document_classification", "document_classification"]
        );
        assert_fields(&profile);

        let repeated = CustomerBillingProfile {
            document_classification_ids: vec![first, first],
            ..profile
        };
        assert!(
            repeated
                .validate()
                .unwrap_err()
                .contains("document_classification_ids")
        );
    }

    #[test]
    fn payable_contact_needs_email() {
        let contact: CustomerContact = serde_json::from_value(json!({
            "customer_id": Uuid::new_v4(),
            "name": "Pat",
            "is_payable_contact": true,
        }))
        .unwrap();
        assert!(contact.validate().unwrap_err().contains("email"));
        assert_fields(&contact);
    }
}
