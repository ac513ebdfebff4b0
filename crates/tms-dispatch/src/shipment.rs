//! Shipment create/update with organization control rules.
//!
//! Payloads go through the generic [`Serializer`], then the service fills
//! derived values (mileage, addresses, hazmat flag, totals) and checks the
//! rules configured in the organization's shipment and billing controls.
//! Additional charges are written here too, since each one changes the
//! totals of its shipment.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::billing::AccessorialCharge;
use tms_core::models::controls::{BillingControl, ShipmentControl, ShipmentTransferCriteria};
use tms_core::models::location::Location;
use tms_core::models::shipment::{AdditionalCharge, Commodity, Shipment, ShipmentStatus};
use tms_core::models::{Entity, Model, amount_fits, amount_too_large};
use tms_core::repository::{ControlRepository, RecordFilter, RecordRepository};
use tms_core::serializer::{Serializer, validate_references};
use tms_core::validation::ValidationErrors;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::google::DistanceProvider;
use crate::mileage::MileageService;
use crate::records::{list_all, stored_value};

/// Name of the per-organization counter behind PRO numbers.
pub const PRO_NUMBER_SEQUENCE: &str = "shipment";

pub fn format_pro_number(sequence: u64) -> String {
    format!("SHP{sequence:06}")
}

pub struct ShipmentService<R, K, P> {
    records: R,
    controls: K,
    mileage: Arc<MileageService<R, K, P>>,
}

impl<R, K, P> ShipmentService<R, K, P>
where
    R: RecordRepository,
    K: ControlRepository,
    P: DistanceProvider,
{
    pub fn new(records: R, controls: K, mileage: Arc<MileageService<R, K, P>>) -> Self {
        Self {
            records,
            controls,
            mileage,
        }
    }

    /// Create a shipment entered by `user_id`.
    pub async fn create(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        payload: &Value,
    ) -> TmsResult<Entity<Shipment>> {
        let serializer = Serializer::<Shipment>::new()?;
        let mut shipment = serializer.to_internal_value(payload, Map::new())?;

        self.prepare(organization_id, &mut shipment, None).await?;

        let sequence = self
            .records
            .next_sequence(organization_id, PRO_NUMBER_SEQUENCE)
            .await?;
        shipment.pro_number = format_pro_number(sequence);
        shipment.entered_by_id = Some(user_id);

        let created = self.records.create(organization_id, shipment).await?;
        info!(
            %organization_id,
            shipment_id = %created.id,
            pro_number = %created.data.pro_number,
            "Shipment created"
        );
        Ok(created)
    }

    /// Update a stored shipment; `partial` keeps omitted fields.
    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        payload: &Value,
        partial: bool,
    ) -> TmsResult<Entity<Shipment>> {
        let existing = self.records.get::<Shipment>(organization_id, id).await?;
        if existing.data.status == ShipmentStatus::Voided {
            let mut errors = ValidationErrors::new();
            errors.add_non_field("Cannot update a voided shipment.");
            return Err(errors.into());
        }

        let serializer = Serializer::<Shipment>::new()?;
        let base = serializer.update_base(&existing, partial)?;
        let mut shipment = serializer.to_internal_value(payload, base)?;

        // Stored mileage no longer applies once either end moves.
        if (shipment.origin_location_id != existing.data.origin_location_id
            || shipment.destination_location_id != existing.data.destination_location_id)
            && !payload_sets(payload, "mileage")
        {
            shipment.mileage = None;
        }

        self.prepare(organization_id, &mut shipment, Some(id)).await?;

        self.records.update(organization_id, id, shipment).await
    }

    /// Derive values and check every rule before a write.
    async fn prepare(
        &self,
        organization_id: Uuid,
        shipment: &mut Shipment,
        current_id: Option<Uuid>,
    ) -> TmsResult<()> {
        let control: ShipmentControl = self.controls.get_or_init(organization_id).await?;
        let billing: BillingControl = self.controls.get_or_init(organization_id).await?;

        if control.calculate_distance && shipment.mileage.is_none() {
            self.fill_mileage(organization_id, shipment).await?;
        }

        let mut errors = match shipment.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        errors.merge(control_rules(&control, shipment));
        errors.merge(billing_rules(&billing, shipment));
        if control.check_for_duplicate_bol {
            errors.merge(
                self.duplicate_bol(organization_id, shipment, current_id)
                    .await?,
            );
        }
        errors.into_result()?;

        validate_references(&self.records, organization_id, shipment.references()).await?;

        self.fill_addresses(organization_id, shipment).await?;
        if let Some(commodity_id) = shipment.commodity_id {
            let commodity = self
                .records
                .get::<Commodity>(organization_id, commodity_id)
                .await?;
            shipment.is_hazmat = commodity.data.is_hazmat;
        }

        if control.auto_shipment_total {
            shipment.sub_total = shipment.calculate_total()?;
        }
        Ok(())
    }

    async fn fill_mileage(&self, organization_id: Uuid, shipment: &mut Shipment) -> TmsResult<()> {
        let (Some(origin), Some(destination)) =
            (shipment.origin_location_id, shipment.destination_location_id)
        else {
            return Ok(());
        };

        match self
            .mileage
            .get_shipment_mileage(organization_id, origin, destination)
            .await
        {
            Ok(mileage) => shipment.mileage = Some(mileage),
            // Missing coordinates or an unreachable provider leave the
            // mileage unset; rate rules report it if it is required.
            Err(e @ (TmsError::Validation(_) | TmsError::ExternalService(_))) => {
                warn!(%organization_id, error = %e, "Could not calculate shipment mileage");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn fill_addresses(&self, organization_id: Uuid, shipment: &mut Shipment) -> TmsResult<()> {
        if shipment.origin_address.trim().is_empty() {
            if let Some(id) = shipment.origin_location_id {
                let location = self.records.get::<Location>(organization_id, id).await?;
                shipment.origin_address = location.data.full_address();
            }
        }
        if shipment.destination_address.trim().is_empty() {
            if let Some(id) = shipment.destination_location_id {
                let location = self.records.get::<Location>(organization_id, id).await?;
                shipment.destination_address = location.data.full_address();
            }
        }
        Ok(())
    }

    async fn duplicate_bol(
        &self,
        organization_id: Uuid,
        shipment: &Shipment,
        current_id: Option<Uuid>,
    ) -> TmsResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if shipment.bol_number.trim().is_empty() {
            return Ok(errors);
        }

        let mut pro_numbers = Vec::new();
        for status in [ShipmentStatus::New, ShipmentStatus::InProgress] {
            let filter = RecordFilter::new()
                .eq("bol_number", shipment.bol_number.clone())
                .eq("status", stored_value(status)?);
            let open: Vec<Entity<Shipment>> =
                list_all(&self.records, organization_id, filter).await?;
            pro_numbers.extend(
                open.into_iter()
                    .filter(|other| Some(other.id) != current_id)
                    .map(|other| other.data.pro_number),
            );
        }

        if !pro_numbers.is_empty() {
            errors.add(
                "bol_number",
                format!(
                    "Duplicate BOL Number found in other shipments with PRO numbers: {}. \
                     If this is a new shipment, please check the BOL Number and try again.",
                    pro_numbers.join(", ")
                ),
            );
        }
        Ok(errors)
    }

    /// Add a charge to a shipment, priced from its accessorial charge.
    pub async fn create_charge(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        payload: &Value,
    ) -> TmsResult<Entity<AdditionalCharge>> {
        let serializer = Serializer::<AdditionalCharge>::new()?;
        let mut charge = serializer.to_internal_value(payload, Map::new())?;
        self.price_charge(organization_id, None, &mut charge).await?;
        charge.entered_by_id = Some(user_id);

        let created = self.records.create(organization_id, charge).await?;
        self.refresh_totals(organization_id, created.data.shipment_id)
            .await?;
        info!(
            %organization_id,
            charge_id = %created.id,
            shipment_id = %created.data.shipment_id,
            "Additional charge added"
        );
        Ok(created)
    }

    /// Update a charge and the totals of every shipment it touched.
    pub async fn update_charge(
        &self,
        organization_id: Uuid,
        id: Uuid,
        payload: &Value,
        partial: bool,
    ) -> TmsResult<Entity<AdditionalCharge>> {
        let existing = self
            .records
            .get::<AdditionalCharge>(organization_id, id)
            .await?;
        self.open_shipment(organization_id, existing.data.shipment_id)
            .await?;
        let serializer = Serializer::<AdditionalCharge>::new()?;
        let base = serializer.update_base(&existing, partial)?;
        let mut charge = serializer.to_internal_value(payload, base)?;
        self.price_charge(organization_id, Some(id), &mut charge).await?;

        let updated = self.records.update(organization_id, id, charge).await?;
        self.refresh_totals(organization_id, updated.data.shipment_id)
            .await?;
        if existing.data.shipment_id != updated.data.shipment_id {
            self.refresh_totals(organization_id, existing.data.shipment_id)
                .await?;
        }
        Ok(updated)
    }

    /// Remove a charge from its shipment.
    pub async fn delete_charge(&self, organization_id: Uuid, id: Uuid) -> TmsResult<()> {
        let existing = self
            .records
            .get::<AdditionalCharge>(organization_id, id)
            .await?;
        self.open_shipment(organization_id, existing.data.shipment_id)
            .await?;
        self.records
            .delete::<AdditionalCharge>(organization_id, id)
            .await?;
        self.refresh_totals(organization_id, existing.data.shipment_id)
            .await
    }

    /// Validate a charge and copy the amount of its accessorial charge.
    ///
    /// `id` names the charge being replaced, if any. The shipment totals
    /// the charge leads to must fit before anything is written.
    async fn price_charge(
        &self,
        organization_id: Uuid,
        id: Option<Uuid>,
        charge: &mut AdditionalCharge,
    ) -> TmsResult<()> {
        charge.validate()?;
        validate_references(&self.records, organization_id, charge.references()).await?;
        let mut shipment = self
            .open_shipment(organization_id, charge.shipment_id)
            .await?
            .data;

        let accessorial = self
            .records
            .get::<AccessorialCharge>(organization_id, charge.accessorial_charge_id)
            .await?;
        if charge.description.trim().is_empty() {
            charge.description = accessorial.data.description.clone();
        }
        charge.apply_amount(accessorial.data.charge_amount)?;

        let others = self
            .charges(organization_id, charge.shipment_id)
            .await?
            .into_iter()
            .filter(|other| Some(other.id) != id)
            .map(|other| other.data.sub_total);
        shipment.other_charge_amount =
            charge_total(others.chain([charge.sub_total])).ok_or_else(|| {
                TmsError::field("unit", amount_too_large())
            })?;
        let control: ShipmentControl = self.controls.get_or_init(organization_id).await?;
        if control.auto_shipment_total {
            shipment.calculate_total()?;
        }
        Ok(())
    }

    async fn charges(
        &self,
        organization_id: Uuid,
        shipment_id: Uuid,
    ) -> TmsResult<Vec<Entity<AdditionalCharge>>> {
        list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("shipment_id", shipment_id.to_string()),
        )
        .await
    }

    /// Load a shipment that still accepts charges.
    async fn open_shipment(
        &self,
        organization_id: Uuid,
        shipment_id: Uuid,
    ) -> TmsResult<Entity<Shipment>> {
        let shipment = self
            .records
            .get::<Shipment>(organization_id, shipment_id)
            .await?;
        if shipment.data.status == ShipmentStatus::Voided {
            return Err(TmsError::field(
                "shipment_id",
                "Charges cannot change on a voided shipment.",
            ));
        }
        Ok(shipment)
    }

    /// Recompute a shipment's other charges, and its total when the
    /// organization totals shipments automatically.
    async fn refresh_totals(&self, organization_id: Uuid, shipment_id: Uuid) -> TmsResult<()> {
        let control: ShipmentControl = self.controls.get_or_init(organization_id).await?;
        let mut shipment = self
            .records
            .get::<Shipment>(organization_id, shipment_id)
            .await?
            .data;
        let charges = self.charges(organization_id, shipment_id).await?;

        shipment.other_charge_amount =
            charge_total(charges.iter().map(|charge| charge.data.sub_total))
                .ok_or_else(|| TmsError::field("other_charge_amount", amount_too_large()))?;
        if control.auto_shipment_total {
            shipment.sub_total = shipment.calculate_total()?;
        }
        debug!(
            %organization_id,
            %shipment_id,
            other_charge_amount = %shipment.other_charge_amount,
            "Shipment charges recomputed"
        );
        self.records
            .update(organization_id, shipment_id, shipment)
            .await?;
        Ok(())
    }
}

/// Sum of charge subtotals, `None` when it does not fit an amount column.
fn charge_total(mut sub_totals: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    sub_totals
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .map(|total| total.round_dp(2))
        .filter(|total| amount_fits(*total))
}

/// Whether the payload carries a non-null value for `field`.
fn payload_sets(payload: &Value, field: &str) -> bool {
    payload.get(field).is_some_and(|v| !v.is_null())
}

/// Rules toggled by the organization's shipment control.
fn control_rules(control: &ShipmentControl, shipment: &Shipment) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if control.enforce_origin_destination
        && shipment.origin_location_id.is_some()
        && shipment.origin_location_id == shipment.destination_location_id
    {
        errors.add(
            "origin_location_id",
            "Origin and Destination locations cannot be the same.",
        );
    }
    if control.enforce_rev_code && shipment.revenue_code_id.is_none() {
        errors.add("revenue_code_id", "Revenue code is required.");
    }
    if control.enforce_commodity && shipment.commodity_id.is_none() {
        errors.add("commodity_id", "Commodity is required.");
    }
    if control.enforce_voided_comm
        && shipment.status == ShipmentStatus::Voided
        && shipment.voided_comm.trim().is_empty()
    {
        errors.add(
            "voided_comm",
            "Voided Comment is required when the shipment is voided.",
        );
    }
    errors
}

fn billing_rules(control: &BillingControl, shipment: &Shipment) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if control.shipment_transfer_criteria == ShipmentTransferCriteria::ReadyAndCompleted
        && shipment.ready_to_bill
        && shipment.status != ShipmentStatus::Completed
    {
        errors.add(
            "ready_to_bill",
            "Shipment must be completed before it can be marked ready to bill.",
        );
    }
    errors
}
