//! Movement and stop writes with dispatch control rules.
//!
//! A movement is checked against its stops, its shipment and the workers
//! assigned to it. Stop writes derive the stop status from its times,
//! fill the address from the location, renumber the movement's stops and
//! carry the first arrival onto the shipment's ship date.

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::controls::{DispatchControl, ShipmentControl};
use tms_core::models::equipment::Tractor;
use tms_core::models::location::Location;
use tms_core::models::movement::{Movement, Stop, is_started};
use tms_core::models::shipment::{Shipment, ShipmentStatus};
use tms_core::models::worker::{Worker, WorkerProfile, WorkerTimeAway};
use tms_core::models::{Entity, Model};
use tms_core::repository::{ControlRepository, RecordFilter, RecordRepository};
use tms_core::serializer::{Serializer, validate_references};
use tms_core::validation::ValidationErrors;
use tracing::{debug, info};
use uuid::Uuid;

use crate::records::list_all;

pub struct MovementService<R, K> {
    records: R,
    controls: K,
}

impl<R, K> MovementService<R, K>
where
    R: RecordRepository,
    K: ControlRepository,
{
    pub fn new(records: R, controls: K) -> Self {
        Self { records, controls }
    }

    pub async fn create(
        &self,
        organization_id: Uuid,
        payload: &Value,
    ) -> TmsResult<Entity<Movement>> {
        let serializer = Serializer::<Movement>::new()?;
        let mut movement = serializer.to_internal_value(payload, Map::new())?;
        self.check(organization_id, &movement, None).await?;

        if let Some(sequence) = Movement::SEQUENCE {
            let value = self.records.next_sequence(organization_id, sequence).await?;
            movement.assign_sequence(value);
        }
        let created = self.records.create(organization_id, movement).await?;
        info!(
            %organization_id,
            movement_id = %created.id,
            ref_num = %created.data.ref_num,
            "Movement created"
        );
        Ok(created)
    }

    /// Update a stored movement; `partial` keeps omitted fields.
    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        payload: &Value,
        partial: bool,
    ) -> TmsResult<Entity<Movement>> {
        let existing = self.records.get::<Movement>(organization_id, id).await?;
        if existing.data.status == ShipmentStatus::Voided {
            return Err(TmsError::field("status", "Cannot update a voided movement."));
        }
        let serializer = Serializer::<Movement>::new()?;
        let base = serializer.update_base(&existing, partial)?;
        let movement = serializer.to_internal_value(payload, base)?;
        self.check(organization_id, &movement, Some(&existing)).await?;
        self.records.update(organization_id, id, movement).await
    }

    /// Every rule a movement must satisfy before it is written.
    async fn check(
        &self,
        organization_id: Uuid,
        movement: &Movement,
        current: Option<&Entity<Movement>>,
    ) -> TmsResult<()> {
        movement.validate()?;
        validate_references(&self.records, organization_id, movement.references()).await?;

        let control: DispatchControl = self.controls.get_or_init(organization_id).await?;
        let shipment = self
            .records
            .get::<Shipment>(organization_id, movement.shipment_id)
            .await?;
        let today = Utc::now().date_naive();

        let mut errors = ValidationErrors::new();
        if let Some(current) = current {
            let stops = self.stops(organization_id, current.id).await?;
            let stops: Vec<Stop> = stops.into_iter().map(|stop| stop.data).collect();
            errors.merge(stop_status_rules(movement.status, &stops));
        }
        errors.merge(
            self.previous_movements(organization_id, movement, current)
                .await?,
        );

        for (field, worker_id) in movement.workers() {
            let worker = self.records.get::<Worker>(organization_id, worker_id).await?;
            if control.regulatory_check {
                let profile = self.profile(organization_id, worker_id).await?;
                if let Some(message) = regulatory_issue(&worker.data, profile.as_ref(), today) {
                    errors.add(field, message);
                }
            }
            if shipment.data.is_hazmat {
                if let Some(message) = hazmat_issue(&worker.data, today) {
                    errors.add(field, message);
                }
            }
            if control.worker_time_away_restriction
                && self.is_away(organization_id, worker_id, today).await?
            {
                errors.add(field, "Cannot assign a worker who is away today.");
            }
        }

        if control.tractor_worker_fleet_constraint {
            if let (Some(worker_id), Some(tractor_id)) =
                (movement.primary_worker_id, movement.tractor_id)
            {
                let worker = self.records.get::<Worker>(organization_id, worker_id).await?;
                let tractor = self.records.get::<Tractor>(organization_id, tractor_id).await?;
                if worker.data.fleet_code_id != tractor.data.fleet_code_id {
                    let message = "The primary worker and tractor must belong to the same fleet.";
                    errors.add("primary_worker_id", message);
                    errors.add("tractor_id", message);
                }
            }
        }

        Ok(errors.into_result()?)
    }

    /// A movement cannot start while an earlier movement of its shipment
    /// is unfinished.
    async fn previous_movements(
        &self,
        organization_id: Uuid,
        movement: &Movement,
        current: Option<&Entity<Movement>>,
    ) -> TmsResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !is_started(movement.status) {
            return Ok(errors);
        }
        let siblings: Vec<Entity<Movement>> = list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("shipment_id", movement.shipment_id.to_string()),
        )
        .await?;
        let unfinished = siblings.iter().find(|other| {
            let earlier = current.is_none_or(|current| {
                other.id != current.id && other.created_at < current.created_at
            });
            earlier && other.data.status != ShipmentStatus::Completed
        });
        if let Some(previous) = unfinished {
            errors.add(
                "status",
                format!(
                    "The previous movement ({}) must be completed before this movement \
                     can start.",
                    previous.data.ref_num
                ),
            );
        }
        Ok(errors)
    }

    async fn profile(
        &self,
        organization_id: Uuid,
        worker_id: Uuid,
    ) -> TmsResult<Option<WorkerProfile>> {
        let profiles: Vec<Entity<WorkerProfile>> = list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("worker_id", worker_id.to_string()),
        )
        .await?;
        Ok(profiles.into_iter().next().map(|profile| profile.data))
    }

    async fn is_away(
        &self,
        organization_id: Uuid,
        worker_id: Uuid,
        day: NaiveDate,
    ) -> TmsResult<bool> {
        let away: Vec<Entity<WorkerTimeAway>> = list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("worker_id", worker_id.to_string()),
        )
        .await?;
        Ok(away.iter().any(|entry| entry.data.covers(day)))
    }

    async fn stops(
        &self,
        organization_id: Uuid,
        movement_id: Uuid,
    ) -> TmsResult<Vec<Entity<Stop>>> {
        list_all(
            &self.records,
            organization_id,
            RecordFilter::new().eq("movement_id", movement_id.to_string()),
        )
        .await
    }

    pub async fn create_stop(
        &self,
        organization_id: Uuid,
        payload: &Value,
    ) -> TmsResult<Entity<Stop>> {
        let serializer = Serializer::<Stop>::new()?;
        let mut stop = serializer.to_internal_value(payload, Map::new())?;
        self.prepare_stop(organization_id, &mut stop).await?;

        let created = self.records.create(organization_id, stop).await?;
        self.after_stop_write(organization_id, created.data.movement_id)
            .await?;
        info!(
            %organization_id,
            stop_id = %created.id,
            movement_id = %created.data.movement_id,
            "Stop created"
        );
        self.records.get(organization_id, created.id).await
    }

    /// Update a stored stop; `partial` keeps omitted fields.
    pub async fn update_stop(
        &self,
        organization_id: Uuid,
        id: Uuid,
        payload: &Value,
        partial: bool,
    ) -> TmsResult<Entity<Stop>> {
        let existing = self.records.get::<Stop>(organization_id, id).await?;
        let serializer = Serializer::<Stop>::new()?;
        let base = serializer.update_base(&existing, partial)?;
        let mut stop = serializer.to_internal_value(payload, base)?;
        self.prepare_stop(organization_id, &mut stop).await?;

        let updated = self.records.update(organization_id, id, stop).await?;
        self.after_stop_write(organization_id, updated.data.movement_id)
            .await?;
        if existing.data.movement_id != updated.data.movement_id {
            self.after_stop_write(organization_id, existing.data.movement_id)
                .await?;
        }
        self.records.get(organization_id, id).await
    }

    /// Remove a stop when the organization allows it.
    pub async fn delete_stop(&self, organization_id: Uuid, id: Uuid) -> TmsResult<()> {
        let control: ShipmentControl = self.controls.get_or_init(organization_id).await?;
        if !control.remove_shipment {
            let mut errors = ValidationErrors::new();
            errors.add_non_field(
                "Organization does not allow Stop removal. Please contact your administrator.",
            );
            return Err(errors.into());
        }
        let existing = self.records.get::<Stop>(organization_id, id).await?;
        self.records.delete::<Stop>(organization_id, id).await?;
        self.after_stop_write(organization_id, existing.data.movement_id)
            .await
    }

    async fn prepare_stop(&self, organization_id: Uuid, stop: &mut Stop) -> TmsResult<()> {
        stop.validate()?;
        validate_references(&self.records, organization_id, stop.references()).await?;
        stop.update_status_from_times();
        if stop.address_line.trim().is_empty() {
            if let Some(location_id) = stop.location_id {
                let location = self
                    .records
                    .get::<Location>(organization_id, location_id)
                    .await?;
                stop.address_line = location.data.full_address();
            }
        }
        Ok(())
    }

    /// Renumber the movement's stops and move the first arrival onto the
    /// shipment.
    async fn after_stop_write(&self, organization_id: Uuid, movement_id: Uuid) -> TmsResult<()> {
        let control: ShipmentControl = self.controls.get_or_init(organization_id).await?;
        let mut stops = self.stops(organization_id, movement_id).await?;

        if control.auto_sequence_stops {
            for (id, sequence) in resequence(&stops) {
                if let Some(stop) = stops.iter_mut().find(|stop| stop.id == id) {
                    stop.data.sequence = sequence;
                    self.records
                        .update(organization_id, id, stop.data.clone())
                        .await?;
                }
            }
            debug!(%organization_id, %movement_id, stops = stops.len(), "Stops resequenced");
        }

        let first_arrival = stops
            .iter()
            .find(|stop| stop.data.sequence == 1)
            .and_then(|stop| stop.data.arrival_time);
        if let Some(arrival) = first_arrival {
            let movement = self
                .records
                .get::<Movement>(organization_id, movement_id)
                .await?;
            let mut shipment = self
                .records
                .get::<Shipment>(organization_id, movement.data.shipment_id)
                .await?
                .data;
            let ship_date = arrival.date_naive();
            if shipment.ship_date != Some(ship_date) {
                shipment.ship_date = Some(ship_date);
                self.records
                    .update(organization_id, movement.data.shipment_id, shipment)
                    .await?;
            }
        }
        Ok(())
    }
}

/// New sequence numbers for stops whose position changed, ordering stops
/// by appointment window.
fn resequence(stops: &[Entity<Stop>]) -> Vec<(Uuid, u32)> {
    let mut ordered: Vec<&Entity<Stop>> = stops.iter().collect();
    ordered.sort_by_key(|stop| (stop.data.appointment_time_window_start, stop.created_at));
    ordered
        .into_iter()
        .zip(1u32..)
        .filter(|(stop, sequence)| stop.data.sequence != *sequence)
        .map(|(stop, sequence)| (stop.id, sequence))
        .collect()
}

/// A movement's status must agree with the progress of its stops.
fn stop_status_rules(status: ShipmentStatus, stops: &[Stop]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let any =
        |statuses: &[ShipmentStatus]| stops.iter().any(|stop| statuses.contains(&stop.status));

    if is_started(status)
        && stops
            .iter()
            .any(|stop| stop.sequence == 1 && stop.status == ShipmentStatus::New)
    {
        errors.add(
            "status",
            "Cannot change status to anything other than `NEW` if any of the stops are \
             not in progress.",
        );
    }
    if status == ShipmentStatus::New
        && any(&[ShipmentStatus::InProgress, ShipmentStatus::Completed])
    {
        errors.add(
            "status",
            "Cannot change status to `NEW` if any of the stops are in progress or completed.",
        );
    }
    if status == ShipmentStatus::Completed
        && any(&[ShipmentStatus::New, ShipmentStatus::InProgress])
    {
        errors.add(
            "status",
            "Cannot change status to `COMPLETED` if any of the stops are in progress or new.",
        );
    }
    errors
}

/// Why a worker fails the regulatory check on `today`, if they do.
fn regulatory_issue(
    worker: &Worker,
    profile: Option<&WorkerProfile>,
    today: NaiveDate,
) -> Option<&'static str> {
    if worker.termination_date.is_some() {
        return Some("Cannot assign a terminated worker.");
    }
    if worker.license_expiration_date.is_some_and(|date| date < today) {
        return Some("Cannot assign a worker with an expired license.");
    }
    profile.and_then(|profile| profile.lapsed(today))
}

/// Why a worker may not haul hazardous material on `today`, if they may not.
fn hazmat_issue(worker: &Worker, today: NaiveDate) -> Option<&'static str> {
    if !worker.endorsements.includes_hazmat() {
        return Some("Worker must be hazmat certified to haul this shipment.");
    }
    if worker.hazmat_expiration_date.is_some_and(|date| date < today) {
        return Some("Worker hazmat certification has expired.");
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;

    fn stop(sequence: u32, status: &str) -> Stop {
        serde_json::from_value(json!({
            "movement_id": Uuid::new_v4(),
            "address_line": "1 Dock Rd",
            "sequence": sequence,
            "status": status,
            "appointment_time_window_start": "2024-03-01T08:00:00Z",
            "appointment_time_window_end": "2024-03-01T10:00:00Z",
        }))
        .unwrap()
    }

    fn worker(extra: Value) -> Worker {
        let mut payload = json!({"code": "JDOE", "first_name": "Jane", "last_name": "Doe"});
        if let (Value::Object(base), Value::Object(extra)) = (&mut payload, extra) {
            base.extend(extra);
        }
        serde_json::from_value(payload).unwrap()
    }

    fn day(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[test]
    fn started_movement_needs_its_first_stop_started() {
        let stops = [stop(1, "NEW"), stop(2, "NEW")];
        assert!(stop_status_rules(ShipmentStatus::InProgress, &stops).contains("status"));
        assert!(stop_status_rules(ShipmentStatus::New, &stops).is_empty());

        let stops = [stop(1, "IN_PROGRESS"), stop(2, "NEW")];
        assert!(stop_status_rules(ShipmentStatus::InProgress, &stops).is_empty());
        assert!(stop_status_rules(ShipmentStatus::New, &stops).contains("status"));
        assert!(stop_status_rules(ShipmentStatus::Completed, &stops).contains("status"));

        let stops = [stop(1, "COMPLETED"), stop(2, "COMPLETED")];
        assert!(stop_status_rules(ShipmentStatus::Completed, &stops).is_empty());
    }

    #[test]
    fn stops_are_numbered_by_appointment() {
        let at = |text: &str| -> DateTime<Utc> { text.parse().unwrap() };
        let entity = |sequence: u32, start: &str| Entity {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            created_at: at("2024-01-01T00:00:00Z"),
            updated_at: at("2024-01-01T00:00:00Z"),
            data: Stop {
                sequence,
                appointment_time_window_start: at(start),
                appointment_time_window_end: at(start),
                ..stop(sequence, "NEW")
            },
        };
        let late = entity(1, "2024-03-02T08:00:00Z");
        let early = entity(1, "2024-03-01T08:00:00Z");
        let changes = resequence(&[late.clone(), early.clone()]);
        assert_eq!(changes, vec![(late.id, 2)]);
        assert!(resequence(&[early, late]).iter().all(|(_, seq)| *seq == 2));
    }

    #[test]
    fn regulatory_check_reads_worker_and_profile() {
        let today = day("2024-06-01");
        assert_eq!(regulatory_issue(&worker(json!({})), None, today), None);

        let terminated = worker(json!({"termination_date": "2024-05-01"}));
        assert!(regulatory_issue(&terminated, None, today).unwrap().contains("terminated"));

        let expired = worker(json!({"license_expiration_date": "2024-05-31"}));
        assert!(regulatory_issue(&expired, None, today).unwrap().contains("license"));

        let profile: WorkerProfile = serde_json::from_value(json!({
            "worker_id": Uuid::new_v4(),
            "medical_cert_date": "2024-01-01",
        }))
        .unwrap();
        let issue = regulatory_issue(&worker(json!({})), Some(&profile), today).unwrap();
        assert!(issue.contains("medical certificate"));
    }

    #[test]
    fn hazmat_needs_a_current_endorsement() {
        let today = day("2024-06-01");
        assert!(hazmat_issue(&worker(json!({})), today).is_some());
        let tanker = worker(json!({"endorsements": "TANKER"}));
        assert!(hazmat_issue(&tanker, today).is_some());

        let lapsed = worker(json!({
            "endorsements": "HAZMAT",
            "hazmat_expiration_date": "2024-05-01",
        }));
        assert!(hazmat_issue(&lapsed, today).unwrap().contains("expired"));

        let current = worker(json!({
            "endorsements": "TANKER_HAZMAT",
            "hazmat_expiration_date": "2025-05-01",
        }));
        assert_eq!(hazmat_issue(&current, today), None);
    }
}
