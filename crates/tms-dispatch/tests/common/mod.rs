//! Shared fixtures for dispatch integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tms_core::models::location::{Location, LocationStatus};
use tms_core::models::route::DistanceUnit;
use tms_core::repository::RecordRepository;
use tms_db::repository::{SurrealControlRepository, SurrealRecordRepository};
use tms_dispatch::{DispatchError, DistanceProvider, DistanceResult, MileageConfig, MileageService};
use uuid::Uuid;

/// Distance provider returning a fixed distance and counting calls.
#[derive(Clone, Default)]
pub struct StubProvider {
    pub distance: f64,
    pub calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DistanceProvider for StubProvider {
    async fn distance(
        &self,
        _origin: &str,
        _destination: &str,
        _unit: DistanceUnit,
    ) -> Result<DistanceResult, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DistanceResult {
            distance: self.distance,
            duration_minutes: Some(240.0),
        })
    }
}

pub type Mileage =
    MileageService<SurrealRecordRepository<Db>, SurrealControlRepository<Db>, StubProvider>;

pub async fn setup_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tms_db::run_migrations(&db).await.unwrap();
    db
}

pub fn mileage_service(db: &Surreal<Db>, provider: Option<StubProvider>) -> Mileage {
    MileageService::new(
        SurrealRecordRepository::new(db.clone()),
        SurrealControlRepository::new(db.clone()),
        provider,
        &MileageConfig::default(),
    )
}

pub fn location(code: &str, city: &str, coordinates: Option<(f64, f64)>) -> Location {
    Location {
        code: code.into(),
        name: format!("{city} Terminal"),
        status: LocationStatus::Active,
        location_category_id: None,
        depot_id: None,
        description: String::new(),
        address_line_1: "1 Dock St".into(),
        address_line_2: String::new(),
        city: city.into(),
        state: "TX".into(),
        zip_code: "77002".into(),
        latitude: coordinates.map(|c| c.0),
        longitude: coordinates.map(|c| c.1),
        place_id: String::new(),
        is_geocoded: coordinates.is_some(),
    }
}

pub const HOUSTON: (f64, f64) = (29.7604, -95.3698);
pub const DALLAS: (f64, f64) = (32.7767, -96.7970);

/// Houston and Dallas locations, with or without coordinates.
pub async fn two_locations(
    records: &SurrealRecordRepository<Db>,
    organization_id: Uuid,
    with_coordinates: bool,
) -> (Uuid, Uuid) {
    let origin = records
        .create(
            organization_id,
            location("HOU", "Houston", with_coordinates.then_some(HOUSTON)),
        )
        .await
        .unwrap();
    let destination = records
        .create(
            organization_id,
            location("DAL", "Dallas", with_coordinates.then_some(DALLAS)),
        )
        .await
        .unwrap();
    (origin.id, destination.id)
}
