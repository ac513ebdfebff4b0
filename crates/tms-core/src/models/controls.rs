//! Per-organization control settings.
//!
//! Each control is a single row per organization, created with its
//! `Default` values the first time it is read.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::route::{DistanceMethod, DistanceUnit};
use crate::models::{Control, ForeignKey};
use crate::validation::ValidationErrors;

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEntryCriteria {
    #[default]
    OnShipmentBill,
    OnReceiptOfPayment,
    OnExpenseRecognition,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdAction {
    #[default]
    Halt,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccountingControl {
    pub rec_threshold: i64,
    pub rec_threshold_action: ThresholdAction,
    pub default_revenue_account_id: Option<Uuid>,
    pub default_expense_account_id: Option<Uuid>,
    pub journal_entry_criteria: JournalEntryCriteria,
    pub auto_create_journal_entries: bool,
    pub restrict_manual_journal_entries: bool,
    pub require_journal_entry_approval: bool,
    pub enable_rec_notifications: bool,
    pub halt_on_pending_rec: bool,
    pub critical_processes: Option<String>,
}

impl Default for AccountingControl {
    fn default() -> Self {
        Self {
            rec_threshold: 50,
            rec_threshold_action: ThresholdAction::Halt,
            default_revenue_account_id: None,
            default_expense_account_id: None,
            journal_entry_criteria: JournalEntryCriteria::OnShipmentBill,
            auto_create_journal_entries: false,
            restrict_manual_journal_entries: false,
            require_journal_entry_approval: false,
            enable_rec_notifications: true,
            halt_on_pending_rec: false,
            critical_processes: None,
        }
    }
}

impl Control for AccountingControl {
    const TABLE: &'static str = "accounting_control";
    const KIND: &'static str = "accounting";
    const FOREIGN_KEYS: &'static [ForeignKey] = &[
        ForeignKey::protect("default_revenue_account_id", "general_ledger_account"),
        ForeignKey::protect("default_expense_account_id", "general_ledger_account"),
    ];

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.rec_threshold < 0 {
            errors.add(
                "rec_threshold",
                "Ensure this value is greater than or equal to 0.",
            );
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoBillCriteria {
    Delivery,
    TransferredToBill,
    MarkedReadyToBill,
}

/// What a shipment must satisfy before it can move to billing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentTransferCriteria {
    #[default]
    ReadyAndCompleted,
    Completed,
    ReadyToBill,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BillingControl {
    pub remove_billing_history: bool,
    pub auto_bill_shipment: bool,
    pub auto_mark_ready_to_bill: bool,
    pub validate_customer_rates: bool,
    pub enforce_customer_billing: bool,
    pub auto_bill_criteria: Option<AutoBillCriteria>,
    pub shipment_transfer_criteria: ShipmentTransferCriteria,
    /// Prepended to the PRO number to form an invoice number.
    pub invoice_number_prefix: String,
}

impl Default for BillingControl {
    fn default() -> Self {
        Self {
            remove_billing_history: false,
            auto_bill_shipment: false,
            auto_mark_ready_to_bill: false,
            validate_customer_rates: false,
            enforce_customer_billing: false,
            auto_bill_criteria: Some(AutoBillCriteria::MarkedReadyToBill),
            shipment_transfer_criteria: ShipmentTransferCriteria::ReadyAndCompleted,
            invoice_number_prefix: "INV-".into(),
        }
    }
}

impl Control for BillingControl {
    const TABLE: &'static str = "billing_control";
    const KIND: &'static str = "billing";

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.auto_bill_shipment && self.auto_bill_criteria.is_none() {
            errors.add(
                "auto_bill_criteria",
                "Auto billing criteria is required when auto bill shipment is on.",
            );
        }
        if self.invoice_number_prefix.chars().count() > 10 {
            errors.add(
                "invoice_number_prefix",
                "Ensure this field has no more than 10 characters.",
            );
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceIncident {
    #[default]
    Never,
    Pickup,
    Delivery,
    PickupDelivery,
    AllExceptShipper,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchControl {
    pub record_service_incident: ServiceIncident,
    /// Target deadhead percentage.
    pub deadhead_target: f64,
    pub max_shipment_weight_limit: u32,
    /// Minutes of lateness tolerated before a service incident is recorded.
    pub grace_period: u16,
    pub enforce_worker_assign: bool,
    pub trailer_continuity: bool,
    pub dupe_trailer_check: bool,
    pub maintenance_compliance: bool,
    pub regulatory_check: bool,
    pub prev_shipment_on_hold: bool,
    pub worker_time_away_restriction: bool,
    pub tractor_worker_fleet_constraint: bool,
}

impl Default for DispatchControl {
    fn default() -> Self {
        Self {
            record_service_incident: ServiceIncident::Never,
            deadhead_target: 0.0,
            max_shipment_weight_limit: 80_000,
            grace_period: 0,
            enforce_worker_assign: true,
            trailer_continuity: false,
            dupe_trailer_check: false,
            maintenance_compliance: true,
            regulatory_check: false,
            prev_shipment_on_hold: false,
            worker_time_away_restriction: true,
            tractor_worker_fleet_constraint: false,
        }
    }
}

impl Control for DispatchControl {
    const TABLE: &'static str = "dispatch_control";
    const KIND: &'static str = "dispatch";

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.deadhead_target.is_finite() || self.deadhead_target < 0.0 {
            errors.add(
                "deadhead_target",
                "Ensure this value is greater than or equal to 0.",
            );
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RouteControl {
    pub distance_method: DistanceMethod,
    pub mileage_unit: DistanceUnit,
    /// Persist a route for every newly calculated distance.
    pub generate_routes: bool,
}

impl Control for RouteControl {
    const TABLE: &'static str = "route_control";
    const KIND: &'static str = "route";

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.generate_routes && self.distance_method == DistanceMethod::Geodesic {
            errors.add(
                "generate_routes",
                "Cannot generate routes with the geodesic distance method.",
            );
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Shipment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShipmentControl {
    pub auto_rate_shipment: bool,
    /// Fill in missing mileage from the route distance.
    pub calculate_distance: bool,
    pub enforce_rev_code: bool,
    pub enforce_voided_comm: bool,
    pub generate_routes: bool,
    pub enforce_commodity: bool,
    pub auto_sequence_stops: bool,
    /// Compute `sub_total` from the rate method on save.
    pub auto_shipment_total: bool,
    pub enforce_origin_destination: bool,
    pub check_for_duplicate_bol: bool,
    pub send_placard_info: bool,
    pub enforce_hazmat_seg_rules: bool,
    /// Allow stops to be deleted.
    pub remove_shipment: bool,
}

impl Default for ShipmentControl {
    fn default() -> Self {
        Self {
            auto_rate_shipment: true,
            calculate_distance: true,
            enforce_rev_code: false,
            enforce_voided_comm: false,
            generate_routes: false,
            enforce_commodity: false,
            auto_sequence_stops: true,
            auto_shipment_total: true,
            enforce_origin_destination: false,
            check_for_duplicate_bol: false,
            send_placard_info: false,
            enforce_hazmat_seg_rules: true,
            remove_shipment: false,
        }
    }
}

impl Control for ShipmentControl {
    const TABLE: &'static str = "shipment_control";
    const KIND: &'static str = "shipment";
}
