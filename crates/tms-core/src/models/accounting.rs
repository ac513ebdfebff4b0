//! Accounting domain models: general ledger accounts and revenue codes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForeignKey, Model};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashFlowType {
    Operating,
    Investing,
    Financing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralLedgerAccount {
    #[serde(default)]
    pub status: AccountStatus,
    /// Formatted as `####-##`.
    pub account_number: String,
    #[serde(default)]
    pub description: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub cash_flow_type: Option<CashFlowType>,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub parent_account_id: Option<Uuid>,
    #[serde(default)]
    pub is_reconciled: bool,
    #[serde(default)]
    pub date_opened: Option<NaiveDate>,
    #[serde(default)]
    pub date_closed: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

/// Whether `number` matches `####-##`.
pub fn is_valid_account_number(number: &str) -> bool {
    let bytes = number.as_bytes();
    bytes.len() == 7
        && bytes[4] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || b.is_ascii_digit())
}

impl Model for GeneralLedgerAccount {
    const TABLE: &'static str = "general_ledger_account";
    const PATH: &'static str = "gl_accounts";
    const FIELDS: &'static [&'static str] = &[
        "status",
        "account_number",
        "description",
        "account_type",
        "cash_flow_type",
        "balance",
        "parent_account_id",
        "is_reconciled",
        "date_opened",
        "date_closed",
        "notes",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("parent_account_id", Self::TABLE),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["balance"],
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !is_valid_account_number(&self.account_number) {
            errors.add(
                "account_number",
                "Account number must be in the format ####-##.",
            );
        }
        if let (Some(opened), Some(closed)) = (self.date_opened, self.date_closed) {
            if closed < opened {
                errors.add("date_closed", "Date closed cannot be before date opened.");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueCode {
    /// Four-character code.
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expense_account_id: Option<Uuid>,
    #[serde(default)]
    pub revenue_account_id: Option<Uuid>,
}

impl Model for RevenueCode {
    const TABLE: &'static str = "revenue_code";
    const PATH: &'static str = "revenue_codes";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "description",
        "expense_account_id",
        "revenue_account_id",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("revenue_account_id", GeneralLedgerAccount::TABLE),
        ForeignKey::protect("expense_account_id", GeneralLedgerAccount::TABLE),
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.is_empty() || self.code.chars().count() > 4 {
            errors.add("code", "Code must be 1 to 4 characters.");
        }
        errors.into_result()
    }
}
