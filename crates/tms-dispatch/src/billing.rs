//! Moving shipments through billing.
//!
//! Eligible shipments are copied into the billing queue and marked as
//! transferred; shipments that cannot move are recorded as billing
//! exceptions. Billing a queued row marks its shipment billed and moves
//! the row into the billing history.

use chrono::Utc;
use serde::Serialize;
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::billing::{
    BillType, BillingException, BillingExceptionType, BillingHistory, BillingItem, BillingQueue,
    BillingTransferLog,
};
use tms_core::models::controls::{BillingControl, ShipmentTransferCriteria};
use tms_core::models::customer::CustomerBillingProfile;
use tms_core::models::movement::Movement;
use tms_core::models::shipment::{Commodity, Shipment, ShipmentStatus};
use tms_core::models::{Entity, Model};
use tms_core::repository::{ControlRepository, RecordFilter, RecordRepository};
use tms_core::validation::ValidationErrors;
use tracing::{info, warn};
use uuid::Uuid;

use crate::records::list_all;

/// Result of a transfer request.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TransferSummary {
    /// PRO numbers now in the billing queue.
    pub transferred: Vec<String>,
    /// PRO numbers recorded as billing exceptions instead.
    pub exceptions: Vec<String>,
}

/// Result of a billing request.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BillSummary {
    /// Invoice numbers moved to the billing history.
    pub billed: Vec<String>,
    /// Invoice numbers left in the queue for missing billing details.
    pub missing: Vec<String>,
}

pub struct BillingService<R, K> {
    records: R,
    controls: K,
}

impl<R, K> BillingService<R, K>
where
    R: RecordRepository,
    K: ControlRepository,
{
    pub fn new(records: R, controls: K) -> Self {
        Self { records, controls }
    }

    /// Transfer the shipments named by `pro_numbers` to the billing queue.
    ///
    /// Fails without writing anything when none of them is eligible.
    pub async fn transfer_to_billing(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        pro_numbers: &[String],
    ) -> TmsResult<TransferSummary> {
        let control: BillingControl = self.controls.get_or_init(organization_id).await?;

        let mut eligible = Vec::new();
        let mut blocked = Vec::new();
        for pro_number in pro_numbers {
            let found: Vec<Entity<Shipment>> = list_all(
                &self.records,
                organization_id,
                RecordFilter::new().eq("pro_number", pro_number.clone()),
            )
            .await?;
            for shipment in found {
                let blockers =
                    transfer_blockers(&shipment.data, control.shipment_transfer_criteria);
                if blockers.is_empty() {
                    eligible.push(shipment);
                } else {
                    blocked.push((shipment, blockers.join(" ")));
                }
            }
        }

        if eligible.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add_non_field(format!(
                "No shipments found to be eligible for transfer. Shipments must meet the {} \
                 transfer criteria.",
                criteria_name(control.shipment_transfer_criteria)
            ));
            return Err(errors.into());
        }

        let mut summary = TransferSummary::default();
        for (shipment, reason) in blocked {
            self.record_exception(
                organization_id,
                &shipment,
                BillingExceptionType::Other,
                &reason,
            )
            .await?;
            summary.exceptions.push(shipment.data.pro_number);
        }

        let now = Utc::now();
        for shipment in eligible {
            let item = self
                .billing_item(organization_id, &shipment, &control, user_id)
                .await?;
            match self.records.create(organization_id, BillingQueue(item)).await {
                Ok(_) => {}
                Err(TmsError::Validation(errors)) => {
                    let reason = format!("Shipment could not be queued: {errors}");
                    self.record_exception(
                        organization_id,
                        &shipment,
                        BillingExceptionType::Other,
                        &reason,
                    )
                    .await?;
                    summary.exceptions.push(shipment.data.pro_number);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let mut data = shipment.data;
            data.transferred_to_billing = true;
            data.billing_transfer_date = Some(now);
            let pro_number = data.pro_number.clone();
            self.records.update(organization_id, shipment.id, data).await?;
            self.records
                .create(
                    organization_id,
                    BillingTransferLog {
                        shipment_id: shipment.id,
                        transferred_at: now,
                        transferred_by_id: Some(user_id),
                    },
                )
                .await?;
            summary.transferred.push(pro_number);
        }

        info!(
            %organization_id,
            %user_id,
            transferred = summary.transferred.len(),
            exceptions = summary.exceptions.len(),
            "Shipments transferred to billing"
        );
        Ok(summary)
    }

    /// Take queued rows back out of billing.
    pub async fn untransfer(
        &self,
        organization_id: Uuid,
        queue_ids: &[Uuid],
    ) -> TmsResult<Vec<String>> {
        let mut invoices = Vec::new();
        for id in queue_ids {
            let queued = self.records.get::<BillingQueue>(organization_id, *id).await?;
            let item = queued.data.0;
            let mut shipment = self
                .records
                .get::<Shipment>(organization_id, item.shipment_id)
                .await?
                .data;
            shipment.transferred_to_billing = false;
            shipment.billing_transfer_date = None;
            self.records
                .update(organization_id, item.shipment_id, shipment)
                .await?;
            self.records
                .delete::<BillingQueue>(organization_id, *id)
                .await?;
            invoices.push(item.invoice_number);
        }
        info!(%organization_id, count = invoices.len(), "Shipments untransferred from billing");
        Ok(invoices)
    }

    /// Bill queued rows, moving each into the billing history.
    ///
    /// When the organization enforces customer billing, a row whose
    /// customer has no active billing profile stays queued.
    pub async fn bill(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        queue_ids: &[Uuid],
    ) -> TmsResult<BillSummary> {
        let control: BillingControl = self.controls.get_or_init(organization_id).await?;
        let today = Utc::now().date_naive();

        let mut summary = BillSummary::default();
        for id in queue_ids {
            let queued = self.records.get::<BillingQueue>(organization_id, *id).await?;
            let mut item = queued.data.0;
            let mut shipment = self
                .records
                .get::<Shipment>(organization_id, item.shipment_id)
                .await?;

            if control.enforce_customer_billing
                && !self.has_billing_profile(organization_id, item.customer_id).await?
            {
                let reason = "Customer has no active billing profile.";
                self.record_exception(
                    organization_id,
                    &shipment,
                    BillingExceptionType::Paperwork,
                    reason,
                )
                .await?;
                summary.missing.push(item.invoice_number);
                continue;
            }

            shipment.data.billed = true;
            shipment.data.bill_date = Some(today);
            self.records
                .update(organization_id, shipment.id, shipment.data)
                .await?;

            item.bill_date = Some(today);
            item.user_id = Some(user_id);
            let invoice_number = item.invoice_number.clone();
            self.records
                .create(organization_id, BillingHistory(item))
                .await?;
            self.records
                .delete::<BillingQueue>(organization_id, *id)
                .await?;
            summary.billed.push(invoice_number);
        }

        info!(
            %organization_id,
            %user_id,
            billed = summary.billed.len(),
            missing = summary.missing.len(),
            "Billing run finished"
        );
        Ok(summary)
    }

    /// Delete a billing history row when the organization allows it.
    pub async fn delete_history(&self, organization_id: Uuid, id: Uuid) -> TmsResult<()> {
        let control: BillingControl = self.controls.get_or_init(organization_id).await?;
        if !control.remove_billing_history {
            let mut errors = ValidationErrors::new();
            errors.add_non_field("Organization does not allow billing history removal.");
            return Err(errors.into());
        }
        self.records
            .delete::<BillingHistory>(organization_id, id)
            .await
    }

    async fn billing_item(
        &self,
        organization_id: Uuid,
        shipment: &Entity<Shipment>,
        control: &BillingControl,
        user_id: Uuid,
    ) -> TmsResult<BillingItem> {
        let data = &shipment.data;
        let commodity_descr = match data.commodity_id {
            Some(id) => {
                self.records
                    .get::<Commodity>(organization_id, id)
                    .await?
                    .data
                    .name
            }
            None => String::new(),
        };
        let movements: Vec<Entity<Movement>> = list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("shipment_id", shipment.id.to_string()),
        )
        .await?;
        let worker_id = movements
            .iter()
            .min_by_key(|movement| movement.created_at)
            .and_then(|movement| movement.data.primary_worker_id);

        Ok(BillingItem {
            shipment_id: shipment.id,
            customer_id: data.customer_id,
            shipment_type_id: data.shipment_type_id,
            revenue_code_id: data.revenue_code_id,
            commodity_id: data.commodity_id,
            worker_id,
            invoice_number: format!("{}{}", control.invoice_number_prefix, data.pro_number),
            bill_type: BillType::Invoice,
            pieces: data.pieces,
            weight: data.weight,
            mileage: data.mileage,
            commodity_descr,
            bol_number: data.bol_number.clone(),
            consignee_ref_number: data.consignee_ref_number.clone(),
            ready_to_bill: data.ready_to_bill,
            bill_date: None,
            freight_charge_amount: data.freight_charge_amount,
            other_charge_total: data.other_charge_amount,
            total_amount: data.sub_total,
            is_summary: false,
            is_cancelled: false,
            user_id: Some(user_id),
        })
    }

    async fn has_billing_profile(
        &self,
        organization_id: Uuid,
        customer_id: Uuid,
    ) -> TmsResult<bool> {
        let profiles: Vec<Entity<CustomerBillingProfile>> = list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("customer_id", customer_id.to_string()),
        )
        .await?;
        Ok(profiles.iter().any(|profile| profile.data.is_active))
    }

    async fn record_exception(
        &self,
        organization_id: Uuid,
        shipment: &Entity<Shipment>,
        exception_type: BillingExceptionType,
        reason: &str,
    ) -> TmsResult<()> {
        warn!(
            %organization_id,
            shipment_id = %shipment.id,
            pro_number = %shipment.data.pro_number,
            reason,
            "Billing exception recorded"
        );
        let exception = BillingException {
            shipment_id: shipment.id,
            exception_type,
            exception_message: format!("Shipment {}: {reason}", shipment.data.pro_number),
        };
        exception.validate()?;
        self.records.create(organization_id, exception).await?;
        Ok(())
    }
}

fn criteria_name(criteria: ShipmentTransferCriteria) -> &'static str {
    match criteria {
        ShipmentTransferCriteria::ReadyAndCompleted => "ready to bill and completed",
        ShipmentTransferCriteria::Completed => "completed",
        ShipmentTransferCriteria::ReadyToBill => "ready to bill",
    }
}

/// Why a shipment cannot be transferred to billing; empty when it can.
pub fn transfer_blockers(
    shipment: &Shipment,
    criteria: ShipmentTransferCriteria,
) -> Vec<&'static str> {
    let mut blockers = Vec::new();
    if shipment.billed {
        blockers.push("Shipment has already been billed.");
    }
    if shipment.transferred_to_billing {
        blockers.push("Shipment has already been transferred to billing.");
    }
    if shipment.status == ShipmentStatus::Voided {
        blockers.push("Shipment has been voided.");
    }
    let completed = shipment.status == ShipmentStatus::Completed;
    match criteria {
        ShipmentTransferCriteria::ReadyAndCompleted if !(completed && shipment.ready_to_bill) => {
            blockers.push(
                "Shipment must be `COMPLETED` and marked ready to bill before transferring \
                 to billing.",
            );
        }
        ShipmentTransferCriteria::Completed if !completed => {
            blockers.push("Shipment must be `COMPLETED` before transferring to billing.");
        }
        ShipmentTransferCriteria::ReadyToBill if !shipment.ready_to_bill => {
            blockers.push("Shipment must be marked ready to bill before transferring to billing.");
        }
        _ => {}
    }
    blockers
}
