//! Billing domain models: charge types, accessorial charges, document
//! classifications and the billing queue a shipment moves through once its
//! work is done.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForeignKey, Model, check_amount};
use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

/// Name of the document classification that may never be removed.
pub const PROTECTED_DOCUMENT_CLASSIFICATION: &str = "CON";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeType {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Model for ChargeType {
    const TABLE: &'static str = "charge_type";
    const PATH: &'static str = "charge_types";
    const FIELDS: &'static [&'static str] = &["name", "description"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        errors.into_result()
    }
}

/// How an accessorial charge amount is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeMethod {
    Distance,
    #[default]
    Flat,
    Percentage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessorialCharge {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_detention: bool,
    #[serde(default)]
    pub charge_amount: Decimal,
    #[serde(default)]
    pub method: ChargeMethod,
}

impl Model for AccessorialCharge {
    const TABLE: &'static str = "accessorial_charge";
    const PATH: &'static str = "accessorial_charges";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "description",
        "is_detention",
        "charge_amount",
        "method",
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["code"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.trim().is_empty() {
            errors.add("code", "This field may not be blank.");
        }
        if self.charge_amount.is_sign_negative() {
            errors.add(
                "charge_amount",
                "Ensure this value is greater than or equal to 0.",
            );
        } else if self.method == ChargeMethod::Percentage
            && self.charge_amount > Decimal::ONE_HUNDRED
        {
            errors.add(
                "charge_amount",
                "A percentage charge cannot exceed 100.",
            );
        }
        check_amount(&mut errors, "charge_amount", self.charge_amount);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentClassification {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Model for DocumentClassification {
    const TABLE: &'static str = "document_classification";
    const PATH: &'static str = "document_classifications";
    const FIELDS: &'static [&'static str] = &["name", "description"];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        errors.into_result()
    }

    fn validate_delete(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name == PROTECTED_DOCUMENT_CLASSIFICATION {
            errors.add(
                "name",
                "Document classification with this name cannot be deleted.",
            );
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillType {
    #[default]
    Invoice,
    Credit,
    Debit,
    Prepaid,
    Other,
}

/// Billing details copied from a shipment when it is transferred to billing.
///
/// The same row shape is kept while the shipment waits in the
/// [`BillingQueue`] and after it is billed, as [`BillingHistory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingItem {
    pub shipment_id: Uuid,
    pub customer_id: Uuid,
    pub shipment_type_id: Uuid,
    #[serde(default)]
    pub revenue_code_id: Option<Uuid>,
    #[serde(default)]
    pub commodity_id: Option<Uuid>,
    #[serde(default)]
    pub worker_id: Option<Uuid>,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub bill_type: BillType,
    #[serde(default)]
    pub pieces: u32,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub mileage: Option<f64>,
    #[serde(default)]
    pub commodity_descr: String,
    #[serde(default)]
    pub bol_number: String,
    #[serde(default)]
    pub consignee_ref_number: String,
    #[serde(default)]
    pub ready_to_bill: bool,
    #[serde(default)]
    pub bill_date: Option<NaiveDate>,
    #[serde(default)]
    pub freight_charge_amount: Decimal,
    #[serde(default)]
    pub other_charge_total: Decimal,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub is_summary: bool,
    #[serde(default)]
    pub is_cancelled: bool,
    /// User who transferred the shipment.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

const BILLING_ITEM_FIELDS: &[&str] = &[
    "shipment_id",
    "customer_id",
    "shipment_type_id",
    "revenue_code_id",
    "commodity_id",
    "worker_id",
    "invoice_number",
    "bill_type",
    "pieces",
    "weight",
    "mileage",
    "commodity_descr",
    "bol_number",
    "consignee_ref_number",
    "ready_to_bill",
    "bill_date",
    "freight_charge_amount",
    "other_charge_total",
    "total_amount",
    "is_summary",
    "is_cancelled",
    "user_id",
];

const BILLING_ITEM_READ_ONLY: &[&str] = &["shipment_id", "invoice_number", "user_id"];

impl BillingItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, amount) in [
            ("freight_charge_amount", self.freight_charge_amount),
            ("other_charge_total", self.other_charge_total),
            ("total_amount", self.total_amount),
        ] {
            check_amount(&mut errors, field, amount);
        }
        if self.weight.is_sign_negative() {
            errors.add("weight", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result()
    }
}

/// A shipment waiting to be billed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingQueue(pub BillingItem);

impl Model for BillingQueue {
    const TABLE: &'static str = "billing_queue";
    const PATH: &'static str = "billing_queue";
    const FIELDS: &'static [&'static str] = BILLING_ITEM_FIELDS;
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::cascade("shipment_id", "shipment"),
        ForeignKey::protect("customer_id", "customer"),
        ForeignKey::protect("shipment_type_id", "shipment_type"),
        ForeignKey::protect("revenue_code_id", "revenue_code"),
        ForeignKey::protect("commodity_id", "commodity"),
        ForeignKey::protect("worker_id", "worker"),
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["shipment_id"];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: BILLING_ITEM_READ_ONLY,
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        self.0.validate()
    }
}

/// A billed shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingHistory(pub BillingItem);

impl Model for BillingHistory {
    const TABLE: &'static str = "billing_history";
    const PATH: &'static str = "billing_history";
    const FIELDS: &'static [&'static str] = BILLING_ITEM_FIELDS;
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("shipment_id", "shipment"),
        ForeignKey::protect("customer_id", "customer"),
        ForeignKey::protect("shipment_type_id", "shipment_type"),
        ForeignKey::protect("revenue_code_id", "revenue_code"),
        ForeignKey::protect("commodity_id", "commodity"),
        ForeignKey::protect("worker_id", "worker"),
    ];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: BILLING_ITEM_READ_ONLY,
            ..FieldSpec::ALL
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        self.0.validate()
    }
}

/// One shipment moved to the billing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingTransferLog {
    pub shipment_id: Uuid,
    pub transferred_at: DateTime<Utc>,
    #[serde(default)]
    pub transferred_by_id: Option<Uuid>,
}

impl Model for BillingTransferLog {
    const TABLE: &'static str = "billing_transfer_log";
    const PATH: &'static str = "billing_transfer_logs";
    const FIELDS: &'static [&'static str] =
        &["shipment_id", "transferred_at", "transferred_by_id"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::cascade("shipment_id", "shipment")];

    fn field_spec() -> FieldSpec {
        FieldSpec {
            read_only_fields: &["transferred_by_id"],
            ..FieldSpec::ALL
        }
    }

    fn set_entered_by(&mut self, user_id: Uuid) {
        self.transferred_by_id = Some(user_id);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingExceptionType {
    #[default]
    Paperwork,
    Charge,
    Credit,
    Debit,
    Other,
}

/// A problem keeping a shipment from moving through billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingException {
    pub shipment_id: Uuid,
    #[serde(default)]
    pub exception_type: BillingExceptionType,
    pub exception_message: String,
}

impl Model for BillingException {
    const TABLE: &'static str = "billing_exception";
    const PATH: &'static str = "billing_exceptions";
    const FIELDS: &'static [&'static str] =
        &["shipment_id", "exception_type", "exception_message"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::cascade("shipment_id", "shipment")];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.exception_message.trim().is_empty() {
            errors.add("exception_message", "This field may not be blank.");
        }
        errors.into_result()
    }
}
