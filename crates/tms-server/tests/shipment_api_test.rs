//! Shipment and mileage endpoints.

mod common;

use axum::http::StatusCode;
use common::{TestApp, Tenant, spawn};
use serde_json::{Value, json};
use uuid::Uuid;

/// Records every shipment points at.
struct Refs {
    shipment_type: String,
    customer: String,
}

async fn create(app: &TestApp, tenant: &Tenant, uri: &str, body: Value) -> String {
    let (status, body) = app.post(uri, &tenant.clerk_token, body).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn refs(app: &TestApp, tenant: &Tenant) -> Refs {
    Refs {
        shipment_type: create(
            app,
            tenant,
            "/api/shipment_types",
            json!({"code": "DRY", "description": "Dry van"}),
        )
        .await,
        customer: create(app, tenant, "/api/customers", json!({"name": "Acme Widgets"})).await,
    }
}

async fn location(app: &TestApp, tenant: &Tenant, code: &str, city: &str, at: (f64, f64)) -> String {
    let (status, body) = app
        .post(
            "/api/locations",
            &tenant.clerk_token,
            json!({
                "code": code,
                "name": format!("{city} Terminal"),
                "address_line_1": "1 Dock St",
                "city": city,
                "state": "TX",
                "zip_code": "77002",
                "latitude": at.0,
                "longitude": at.1,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

fn shipment(refs: &Refs) -> Value {
    json!({
        "customer_id": refs.customer,
        "shipment_type_id": refs.shipment_type,
        "origin_address": "100 Main St, Houston, TX 77002",
        "destination_address": "1 Elm St, Dallas, TX 75201",
        "origin_appointment_window_start": "2024-03-01T08:00:00Z",
        "origin_appointment_window_end": "2024-03-01T10:00:00Z",
        "destination_appointment_window_start": "2024-03-02T08:00:00Z",
        "destination_appointment_window_end": "2024-03-02T10:00:00Z",
        "freight_charge_amount": "100.00",
    })
}

#[tokio::test]
async fn shipments_get_pro_numbers_and_totals() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let refs = refs(&app, &tenant).await;

    let mut payload = shipment(&refs);
    payload["pro_number"] = json!("MINE");
    payload["sub_total"] = json!("1.00");
    let (status, created) = app
        .post("/api/shipments", &tenant.clerk_token, payload)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["pro_number"], "SHP000001");
    assert_eq!(created["sub_total"], "100.00");
    assert_eq!(created["entered_by_id"], json!(tenant.clerk_id));
    assert_eq!(created["status"], "NEW");

    let item = format!("/api/shipments/{}", created["id"].as_str().unwrap());
    let (status, patched) = app
        .patch(
            &item,
            &tenant.clerk_token,
            json!({"freight_charge_amount": "120.00", "other_charge_amount": "9.99"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{patched}");
    assert_eq!(patched["other_charge_amount"], "0");
    assert_eq!(patched["sub_total"], "120.00");
    assert_eq!(patched["pro_number"], "SHP000001");

    let (_, page) = app.get("/api/shipments?status=NEW", &tenant.clerk_token).await;
    assert_eq!(page["count"], 1);

    let (status, _) = app.delete(&item, &tenant.clerk_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn shipment_rules_are_reported_per_field() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let refs = refs(&app, &tenant).await;

    let mut payload = shipment(&refs);
    payload["rate_method"] = json!("PER_MILE");
    payload["origin_appointment_window_end"] = json!("2024-03-01T07:00:00Z");
    let (status, body) = app
        .post("/api/shipments", &tenant.clerk_token, payload)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["mileage"].is_array());
    assert!(body["origin_appointment_window_end"].is_array());

    let mut payload = shipment(&refs);
    payload["shipment_type_id"] = json!(Uuid::new_v4());
    let (status, body) = app
        .post("/api/shipments", &tenant.clerk_token, payload)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["shipment_type_id"], json!(["Object does not exist."]));
}

#[tokio::test]
async fn voided_shipments_cannot_change() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let refs = refs(&app, &tenant).await;

    let (_, created) = app
        .post("/api/shipments", &tenant.clerk_token, shipment(&refs))
        .await;
    let item = format!("/api/shipments/{}", created["id"].as_str().unwrap());

    let (status, _) = app
        .patch(&item, &tenant.clerk_token, json!({"status": "VOIDED"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(&item, &tenant.clerk_token, json!({"comment": "reopen"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"].is_array());
}

#[tokio::test]
async fn shipment_mileage_comes_from_locations() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let refs = refs(&app, &tenant).await;
    let houston = location(&app, &tenant, "HOU", "Houston", (29.7604, -95.3698)).await;
    let dallas = location(&app, &tenant, "DAL", "Dallas", (32.7767, -96.7970)).await;

    let mut payload = shipment(&refs);
    payload["origin_location_id"] = json!(houston);
    payload["destination_location_id"] = json!(dallas);
    payload["origin_address"] = json!("");
    payload["destination_address"] = json!("");
    payload["rate_method"] = json!("PER_MILE");
    payload["freight_charge_amount"] = json!("1.00");

    let (status, created) = app
        .post("/api/shipments", &tenant.clerk_token, payload)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let mileage = created["mileage"].as_f64().unwrap();
    assert!((220.0..230.0).contains(&mileage), "{mileage}");
    assert_eq!(created["origin_address"], "1 Dock St, Houston, TX 77002");
}

#[tokio::test]
async fn mileage_endpoint() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let houston = location(&app, &tenant, "HOU", "Houston", (29.7604, -95.3698)).await;
    let dallas = location(&app, &tenant, "DAL", "Dallas", (32.7767, -96.7970)).await;

    let (status, body) = app
        .post(
            "/api/routes/mileage",
            &tenant.clerk_token,
            json!({"origin_location_id": houston, "destination_location_id": dallas}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let mileage = body["mileage"].as_f64().unwrap();
    assert!((220.0..230.0).contains(&mileage), "{mileage}");

    let (_, body) = app
        .post(
            "/api/routes/mileage",
            &tenant.clerk_token,
            json!({"origin_location_id": houston, "destination_location_id": houston}),
        )
        .await;
    assert_eq!(body["mileage"], 0.0);

    let (status, body) = app
        .post(
            "/api/routes/mileage",
            &tenant.clerk_token,
            json!({"origin_location_id": houston}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["destination_location_id"].is_array());

    let other = app.tenant("BOLT").await;
    let (status, _) = app
        .post(
            "/api/routes/mileage",
            &other.clerk_token,
            json!({"origin_location_id": houston, "destination_location_id": dallas}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn additional_charges_update_shipment_totals() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let refs = refs(&app, &tenant).await;
    let detention = create(
        &app,
        &tenant,
        "/api/accessorial_charges",
        json!({"code": "DET", "description": "Detention", "charge_amount": "40.00"}),
    )
    .await;
    let shipment_id = create(&app, &tenant, "/api/shipments", shipment(&refs)).await;
    let shipment_item = format!("/api/shipments/{shipment_id}");

    let (status, charge) = app
        .post(
            "/api/additional_charges",
            &tenant.clerk_token,
            json!({
                "shipment_id": shipment_id,
                "accessorial_charge_id": detention,
                "unit": 3,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{charge}");
    assert_eq!(charge["charge_amount"], "40.00");
    assert_eq!(charge["sub_total"], "120.00");
    assert_eq!(charge["description"], "Detention");
    assert_eq!(charge["entered_by_id"], json!(tenant.clerk_id));

    let (_, stored) = app.get(&shipment_item, &tenant.clerk_token).await;
    assert_eq!(stored["other_charge_amount"], "120.00");
    assert_eq!(stored["sub_total"], "220.00");

    let (_, page) = app
        .get(
            &format!("/api/additional_charges?shipment_id={shipment_id}"),
            &tenant.clerk_token,
        )
        .await;
    assert_eq!(page["count"], 1);

    let charge_item = format!("/api/additional_charges/{}", charge["id"].as_str().unwrap());
    let (status, _) = app.delete(&charge_item, &tenant.clerk_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, stored) = app.get(&shipment_item, &tenant.clerk_token).await;
    assert_eq!(stored["sub_total"], "100.00");
}

#[tokio::test]
async fn referenced_records_cannot_be_deleted() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let refs = refs(&app, &tenant).await;
    create(&app, &tenant, "/api/shipments", shipment(&refs)).await;

    let customer_item = format!("/api/customers/{}", refs.customer);
    let (status, body) = app.delete(&customer_item, &tenant.clerk_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["non_field_errors"][0].as_str().unwrap().contains("shipment"),
        "{body}"
    );
    let (status, _) = app.get(&customer_item, &tenant.clerk_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn mileage_follows_unit_and_route_changes() {
    let app = spawn().await;
    let tenant = app.tenant("ACME").await;
    let houston = location(&app, &tenant, "HOU", "Houston", (29.7604, -95.3698)).await;
    let dallas = location(&app, &tenant, "DAL", "Dallas", (32.7767, -96.7970)).await;
    let pair = json!({"origin_location_id": houston, "destination_location_id": dallas});
    let mileage = |body: &Value| body["mileage"].as_f64().unwrap();

    let (_, body) = app
        .post("/api/routes/mileage", &tenant.clerk_token, pair.clone())
        .await;
    assert!((220.0..230.0).contains(&mileage(&body)), "{body}");

    let (status, _) = app
        .put(
            "/api/controls/route",
            &tenant.staff_token,
            json!({"mileage_unit": "METRIC"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app
        .post("/api/routes/mileage", &tenant.clerk_token, pair.clone())
        .await;
    assert!((355.0..370.0).contains(&mileage(&body)), "{body}");

    let route = create(
        &app,
        &tenant,
        "/api/routes",
        json!({
            "origin_location_id": houston,
            "destination_location_id": dallas,
            "total_mileage": 400.0,
            "mileage_unit": "METRIC",
        }),
    )
    .await;
    let (_, body) = app
        .post("/api/routes/mileage", &tenant.clerk_token, pair.clone())
        .await;
    assert_eq!(mileage(&body), 400.0);

    // Removing a location takes its routes along.
    let (status, _) = app
        .delete(&format!("/api/locations/{houston}"), &tenant.clerk_token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .get(&format!("/api/routes/{route}"), &tenant.clerk_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post("/api/routes/mileage", &tenant.clerk_token, pair)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
