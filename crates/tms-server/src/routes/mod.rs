//! REST routes, all mounted under `/api`.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
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
use tms_core::models::worker::{Worker, WorkerComment, WorkerContact, WorkerProfile, WorkerTimeAway};
use tms_core::models::Model;
use tms_core::serializer::deserialize_errors;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

mod billing;
mod controls;
mod mileage;
mod movements;
mod organization;
mod session;
mod shipments;
mod users;
pub mod viewset;

/// Deserialize a JSON body, reporting failures as field errors.
pub(crate) fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::from(deserialize_errors(e)))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn api() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/change-password", post(session::change_password))
        .route("/me", get(session::me))
        .route(
            "/organization",
            get(organization::retrieve).put(organization::update),
        )
        .route(
            "/controls/{kind}",
            get(controls::retrieve).put(controls::update),
        )
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::retrieve)
                .patch(users::update)
                .delete(users::destroy),
        )
        .route(
            &format!("/{}", Shipment::PATH),
            get(viewset::list::<Shipment>).post(shipments::create),
        )
        .route(
            &format!("/{}/{{id}}", Shipment::PATH),
            get(viewset::retrieve::<Shipment>)
                .put(shipments::update)
                .patch(shipments::partial_update)
                .delete(viewset::destroy::<Shipment>),
        )
        .route(
            &format!("/{}", AdditionalCharge::PATH),
            get(viewset::list::<AdditionalCharge>).post(shipments::create_charge),
        )
        .route(
            &format!("/{}/{{id}}", AdditionalCharge::PATH),
            get(viewset::retrieve::<AdditionalCharge>)
                .put(shipments::update_charge)
                .patch(shipments::partial_update_charge)
                .delete(shipments::destroy_charge),
        )
        .route(
            &format!("/{}", Movement::PATH),
            get(viewset::list::<Movement>).post(movements::create),
        )
        .route(
            &format!("/{}/{{id}}", Movement::PATH),
            get(viewset::retrieve::<Movement>)
                .put(movements::update)
                .patch(movements::partial_update)
                .delete(viewset::destroy::<Movement>),
        )
        .route(
            &format!("/{}", Stop::PATH),
            get(viewset::list::<Stop>).post(movements::create_stop),
        )
        .route(
            &format!("/{}/{{id}}", Stop::PATH),
            get(viewset::retrieve::<Stop>)
                .put(movements::update_stop)
                .patch(movements::partial_update_stop)
                .delete(movements::destroy_stop),
        )
        .route("/billing/transfer", post(billing::transfer))
        .route("/billing/untransfer", post(billing::untransfer))
        .route("/billing/bill", post(billing::bill))
        .route(
            &format!("/{}", BillingHistory::PATH),
            get(viewset::list::<BillingHistory>),
        )
        .route(
            &format!("/{}/{{id}}", BillingHistory::PATH),
            get(viewset::retrieve::<BillingHistory>).delete(billing::destroy_history),
        )
        .route("/routes/mileage", post(mileage::calculate))
        .merge(viewset::routes::<Depot>())
        .merge(viewset::routes::<JobTitle>())
        .merge(viewset::routes::<GeneralLedgerAccount>())
        .merge(viewset::routes::<RevenueCode>())
        .merge(viewset::routes::<ChargeType>())
        .merge(viewset::routes::<AccessorialCharge>())
        .merge(viewset::routes::<DocumentClassification>())
        .merge(viewset::routes::<CommentType>())
        .merge(viewset::routes::<DelayCode>())
        .merge(viewset::routes::<FleetCode>())
        .merge(viewset::routes::<Rate>())
        .merge(viewset::routes::<EquipmentType>())
        .merge(viewset::routes::<EquipmentManufacturer>())
        .merge(viewset::routes::<EquipmentMaintenancePlan>())
        .merge(viewset::routes::<Tractor>())
        .merge(viewset::routes::<Trailer>())
        .merge(viewset::routes::<LocationCategory>())
        .merge(viewset::routes::<Location>())
        .merge(viewset::routes::<ShipmentType>())
        .merge(viewset::routes::<ServiceType>())
        .merge(viewset::routes::<Commodity>())
        .merge(viewset::routes::<Route>())
        .merge(viewset::routes::<Worker>())
        .merge(viewset::routes::<WorkerProfile>())
        .merge(viewset::routes::<WorkerContact>())
        .merge(viewset::routes::<WorkerComment>())
        .merge(viewset::routes::<WorkerTimeAway>())
        .merge(viewset::routes::<Customer>())
        .merge(viewset::routes::<CustomerBillingProfile>())
        .merge(viewset::routes::<CustomerContact>())
        .merge(viewset::routes::<ReasonCode>())
        .merge(viewset::routes::<BillingQueue>())
        .merge(viewset::routes::<BillingTransferLog>())
        .merge(viewset::routes::<BillingException>())
}

/// The complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .nest("/api", api())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
