//! Shared application state.

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tms_auth::{AuthConfig, AuthService};
use tms_db::repository::{
    SurrealControlRepository, SurrealOrganizationRepository, SurrealRecordRepository,
    SurrealTokenRepository, SurrealUserRepository,
};
use tms_dispatch::{
    BillingService, GoogleDistanceMatrix, MileageConfig, MileageService, MovementService,
    ShipmentService,
};

pub type Records = SurrealRecordRepository<Any>;
pub type Controls = SurrealControlRepository<Any>;
pub type Users = SurrealUserRepository<Any>;
pub type Organizations = SurrealOrganizationRepository<Any>;
pub type Auth = AuthService<Users, SurrealTokenRepository<Any>, Organizations>;
pub type Mileage = MileageService<Records, Controls, GoogleDistanceMatrix>;
pub type Shipments = ShipmentService<Records, Controls, GoogleDistanceMatrix>;
pub type Movements = MovementService<Records, Controls>;
pub type Billing = BillingService<Records, Controls>;

/// Services and repositories shared by every request handler.
pub struct AppState {
    db: Surreal<Any>,
    pepper: Option<String>,
    pub auth: Auth,
    pub mileage: Arc<Mileage>,
    pub shipments: Shipments,
    pub movements: Movements,
    pub billing: Billing,
}

impl AppState {
    /// Wire the services on top of a migrated database.
    ///
    /// Without a distance provider, mileage falls back to geodesic
    /// distances even for organizations configured for Google.
    pub fn new(
        db: Surreal<Any>,
        auth_config: AuthConfig,
        mileage_config: &MileageConfig,
        provider: Option<GoogleDistanceMatrix>,
    ) -> Arc<Self> {
        let pepper = auth_config.pepper.clone();
        let auth = AuthService::new(
            user_repository(&db, pepper.as_deref()),
            SurrealTokenRepository::new(db.clone()),
            SurrealOrganizationRepository::new(db.clone()),
            auth_config,
        );
        let mileage = Arc::new(MileageService::new(
            SurrealRecordRepository::new(db.clone()),
            SurrealControlRepository::new(db.clone()),
            provider,
            mileage_config,
        ));
        let shipments = ShipmentService::new(
            SurrealRecordRepository::new(db.clone()),
            SurrealControlRepository::new(db.clone()),
            Arc::clone(&mileage),
        );
        let movements = MovementService::new(
            SurrealRecordRepository::new(db.clone()),
            SurrealControlRepository::new(db.clone()),
        );
        let billing = BillingService::new(
            SurrealRecordRepository::new(db.clone()),
            SurrealControlRepository::new(db.clone()),
        );

        Arc::new(Self {
            db,
            pepper,
            auth,
            mileage,
            shipments,
            movements,
            billing,
        })
    }

    pub fn records(&self) -> Records {
        SurrealRecordRepository::new(self.db.clone())
    }

    pub fn controls(&self) -> Controls {
        SurrealControlRepository::new(self.db.clone())
    }

    pub fn organizations(&self) -> Organizations {
        SurrealOrganizationRepository::new(self.db.clone())
    }

    /// User repository hashing with the configured pepper.
    pub fn users(&self) -> Users {
        user_repository(&self.db, self.pepper.as_deref())
    }
}

fn user_repository(db: &Surreal<Any>, pepper: Option<&str>) -> Users {
    match pepper {
        Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.to_string()),
        None => SurrealUserRepository::new(db.clone()),
    }
}
