//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use tms_core::models::Model;
use tms_core::models::accounting::{GeneralLedgerAccount, RevenueCode};
use tms_core::models::billing::{
    AccessorialCharge, BillingException, BillingHistory, BillingQueue, BillingTransferLog,
    ChargeType, DocumentClassification,
};
use tms_core::models::customer::{Customer, CustomerBillingProfile, CustomerContact};
use tms_core::models::dispatch::{CommentType, DelayCode, FleetCode, Rate};
use tms_core::models::equipment::{
    EquipmentMaintenancePlan, EquipmentManufacturer, EquipmentType, Tractor, Trailer,
};
use tms_core::models::location::{Location, LocationCategory};
use tms_core::models::movement::{Movement, Stop};
use tms_core::models::organization::Depot;
use tms_core::models::route::Route;
use tms_core::models::shipment::{
    AdditionalCharge, Commodity, ReasonCode, ServiceType, Shipment, ShipmentType,
};
use tms_core::models::user::JobTitle;
use tms_core::models::worker::{
    Worker, WorkerComment, WorkerContact, WorkerProfile, WorkerTimeAway,
};
use tms_core::models::{
    Control,
    controls::{AccountingControl, BillingControl, DispatchControl, RouteControl, ShipmentControl},
};
use tms_db::{CONTROL_TABLES, RECORD_TABLES};

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tms_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in ["organization", "user", "token", "sequence", "_migration"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
    for table in RECORD_TABLES.iter().chain(CONTROL_TABLES) {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tms_db::run_migrations(&db).await.unwrap();
    tms_db::run_migrations(&db).await.unwrap();
}

#[test]
fn every_model_has_a_table() {
    let tables = [
        Depot::TABLE,
        JobTitle::TABLE,
        GeneralLedgerAccount::TABLE,
        RevenueCode::TABLE,
        ChargeType::TABLE,
        AccessorialCharge::TABLE,
        DocumentClassification::TABLE,
        CommentType::TABLE,
        DelayCode::TABLE,
        FleetCode::TABLE,
        Rate::TABLE,
        EquipmentType::TABLE,
        Tractor::TABLE,
        Trailer::TABLE,
        LocationCategory::TABLE,
        Location::TABLE,
        ShipmentType::TABLE,
        ServiceType::TABLE,
        Commodity::TABLE,
        Shipment::TABLE,
        Route::TABLE,
        Worker::TABLE,
        Customer::TABLE,
        CustomerBillingProfile::TABLE,
        CustomerContact::TABLE,
        AdditionalCharge::TABLE,
        ReasonCode::TABLE,
        WorkerProfile::TABLE,
        WorkerContact::TABLE,
        WorkerComment::TABLE,
        WorkerTimeAway::TABLE,
        EquipmentManufacturer::TABLE,
        EquipmentMaintenancePlan::TABLE,
        Movement::TABLE,
        Stop::TABLE,
        BillingQueue::TABLE,
        BillingTransferLog::TABLE,
        BillingHistory::TABLE,
        BillingException::TABLE,
    ];
    for table in tables {
        assert!(RECORD_TABLES.contains(&table), "{table} has no table");
    }
    assert_eq!(tables.len(), RECORD_TABLES.len());

    for table in [
        AccountingControl::TABLE,
        BillingControl::TABLE,
        DispatchControl::TABLE,
        RouteControl::TABLE,
        ShipmentControl::TABLE,
    ] {
        assert!(CONTROL_TABLES.contains(&table), "{table} has no table");
    }
}
