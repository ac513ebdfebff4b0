//! Integration tests for the generic record repository.

use rust_decimal::Decimal;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tms_core::error::TmsError;
use serde_json::json;
use tms_core::models::customer::{Customer, CustomerContact};
use tms_core::models::dispatch::{CommentType, FleetCode};
use tms_core::models::organization::Depot;
use tms_core::models::user::{CreateUser, JobTitle};
use tms_core::models::worker::Worker;
use tms_core::models::Model;
use tms_core::repository::{Pagination, RecordFilter, RecordRepository, UserRepository};
use tms_core::serializer::FieldSet;
use tms_core::validation::NON_FIELD_ERRORS;
use tms_db::repository::{SurrealRecordRepository, SurrealUserRepository};
use uuid::Uuid;

async fn setup_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tms_db::run_migrations(&db).await.unwrap();
    db
}

async fn setup() -> SurrealRecordRepository<Db> {
    SurrealRecordRepository::new(setup_db().await)
}

fn depot(name: &str) -> Depot {
    Depot {
        name: name.into(),
        description: String::new(),
        address_line_1: "1 Yard Rd".into(),
        city: "Memphis".into(),
        state: "TN".into(),
        zip_code: "38118".into(),
    }
}

fn fleet(code: &str, is_active: bool) -> FleetCode {
    FleetCode {
        code: code.into(),
        description: String::new(),
        is_active,
        revenue_goal: Decimal::new(125000, 2),
        deadhead_goal: Decimal::ZERO,
        mileage_goal: Decimal::ZERO,
    }
}

#[tokio::test]
async fn record_crud_round_trip() {
    let repo = setup().await;
    let org = Uuid::new_v4();

    let created = repo.create(org, depot("Main")).await.unwrap();
    assert_eq!(created.organization_id, org);
    assert_eq!(created.data.city, "Memphis");

    let fetched = repo.get::<Depot>(org, created.id).await.unwrap();
    assert_eq!(fetched.data.name, "Main");

    let mut changed = fetched.data.clone();
    changed.name = "North".into();
    let updated = repo.update(org, created.id, changed).await.unwrap();
    assert_eq!(updated.data.name, "North");
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    repo.delete::<Depot>(org, created.id).await.unwrap();
    assert!(matches!(
        repo.get::<Depot>(org, created.id).await,
        Err(TmsError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete::<Depot>(org, created.id).await,
        Err(TmsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn records_are_isolated_by_organization() {
    let repo = setup().await;
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();

    let a = repo.create(org_a, depot("A")).await.unwrap();
    repo.create(org_b, depot("B")).await.unwrap();

    assert!(matches!(
        repo.get::<Depot>(org_b, a.id).await,
        Err(TmsError::NotFound { .. })
    ));
    assert!(matches!(
        repo.update(org_b, a.id, depot("stolen")).await,
        Err(TmsError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete::<Depot>(org_b, a.id).await,
        Err(TmsError::NotFound { .. })
    ));

    let page = repo
        .list::<Depot>(org_a, RecordFilter::new(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].data.name, "A");

    assert!(repo.exists("depot", org_a, a.id).await.unwrap());
    assert!(!repo.exists("depot", org_b, a.id).await.unwrap());
    assert!(!repo.exists("fleet_code", org_a, a.id).await.unwrap());
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let repo = setup().await;
    let org = Uuid::new_v4();

    for (code, active) in [("EAST", true), ("WEST", true), ("SOUTH", false)] {
        repo.create(org, fleet(code, active)).await.unwrap();
    }

    let active = repo
        .list::<FleetCode>(
            org,
            RecordFilter::new().eq("is_active", true),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(active.total, 2);

    let west = repo
        .list::<FleetCode>(
            org,
            RecordFilter::new().eq("code", "WEST"),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(west.items.len(), 1);
    assert_eq!(west.items[0].data.revenue_goal, Decimal::new(125000, 2));

    let page = repo
        .list::<FleetCode>(
            org,
            RecordFilter::new(),
            Pagination {
                offset: 1,
                limit: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!((page.offset, page.limit), (1, 1));
}

#[tokio::test]
async fn query_filters_match_digit_only_text() {
    let repo = setup().await;
    let org = Uuid::new_v4();
    repo.create(org, depot("Main")).await.unwrap();
    repo.create(org, fleet("EAST", true)).await.unwrap();
    let fields = FieldSet::for_model::<Depot>().unwrap();

    let by_zip = repo
        .list::<Depot>(
            org,
            RecordFilter::from_query(Depot::FIELDS, &fields, [("zip_code", "38118")]),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_zip.total, 1);

    let fleet_fields = FieldSet::for_model::<FleetCode>().unwrap();
    let active = repo
        .list::<FleetCode>(
            org,
            RecordFilter::from_query(FleetCode::FIELDS, &fleet_fields, [("is_active", "true")]),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(active.total, 1);
}

#[tokio::test]
async fn unique_codes_are_enforced_by_the_database() {
    let repo = setup().await;
    let org = Uuid::new_v4();

    let east = repo.create(org, fleet("EAST", true)).await.unwrap();
    match repo.create(org, fleet("EAST", false)).await {
        Err(TmsError::Validation(errors)) => assert!(errors.contains("code")),
        other => panic!("expected a code error, got {other:?}"),
    }
    let west = repo.create(org, fleet("WEST", true)).await.unwrap();
    match repo.update(org, west.id, fleet("EAST", true)).await {
        Err(TmsError::Validation(errors)) => assert!(errors.contains("code")),
        other => panic!("expected a code error, got {other:?}"),
    }
    repo.update(org, east.id, fleet("EAST", false)).await.unwrap();

    repo.create(Uuid::new_v4(), fleet("EAST", true)).await.unwrap();
    let page = repo
        .list::<FleetCode>(org, RecordFilter::new(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn list_rejects_unsafe_filter_fields() {
    let repo = setup().await;
    let err = repo
        .list::<CommentType>(
            Uuid::new_v4(),
            RecordFilter::new().eq("name = 1 OR true", "x"),
            Pagination::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TmsError::Validation(_)));
}

#[tokio::test]
async fn sequences_count_per_organization_and_name() {
    let repo = setup().await;
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();

    assert_eq!(repo.next_sequence(org_a, "shipment").await.unwrap(), 1);
    assert_eq!(repo.next_sequence(org_a, "shipment").await.unwrap(), 2);
    assert_eq!(repo.next_sequence(org_a, "rate").await.unwrap(), 1);
    assert_eq!(repo.next_sequence(org_b, "shipment").await.unwrap(), 1);
    assert_eq!(repo.next_sequence(org_a, "shipment").await.unwrap(), 3);
}

fn protected_by(err: TmsError) -> String {
    match err {
        TmsError::Validation(errors) => errors.messages(NON_FIELD_ERRORS).join(" "),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_cascades_to_dependents() {
    let repo = setup().await;
    let org = Uuid::new_v4();
    let customer: Customer = serde_json::from_value(json!({"name": "Initech"})).unwrap();
    let customer = repo.create(org, customer).await.unwrap();
    let contact: CustomerContact =
        serde_json::from_value(json!({"customer_id": customer.id, "name": "Bill"})).unwrap();
    let contact = repo.create(org, contact).await.unwrap();

    // Another organization's rows are never touched.
    let other = Uuid::new_v4();
    let foreign: CustomerContact =
        serde_json::from_value(json!({"customer_id": customer.id, "name": "Peter"})).unwrap();
    let foreign = repo.create(other, foreign).await.unwrap();

    repo.delete::<Customer>(org, customer.id).await.unwrap();
    assert!(!repo.exists("customer_contact", org, contact.id).await.unwrap());
    assert!(repo.exists("customer_contact", other, foreign.id).await.unwrap());
}

#[tokio::test]
async fn protected_references_block_delete() {
    let repo = setup().await;
    let org = Uuid::new_v4();
    let worker = |code: &str, manager: Option<Uuid>| -> Worker {
        serde_json::from_value(json!({
            "code": code,
            "first_name": "Pat",
            "last_name": "Lee",
            "manager_id": manager,
        }))
        .unwrap()
    };
    let manager = repo.create(org, worker("MGR", None)).await.unwrap();
    let driver = repo
        .create(org, worker("DRV", Some(manager.id)))
        .await
        .unwrap();

    let err = repo.delete::<Worker>(org, manager.id).await.unwrap_err();
    assert!(protected_by(err).contains("worker"));
    assert_eq!(repo.referenced_by("worker", org, manager.id).await.unwrap(), Some("worker"));

    repo.delete::<Worker>(org, driver.id).await.unwrap();
    assert_eq!(repo.referenced_by("worker", org, manager.id).await.unwrap(), None);
    repo.delete::<Worker>(org, manager.id).await.unwrap();
}

#[tokio::test]
async fn users_protect_their_job_title() {
    let db = setup_db().await;
    let repo = SurrealRecordRepository::new(db.clone());
    let org = Uuid::new_v4();
    let title: JobTitle = serde_json::from_value(json!({"name": "Dispatcher"})).unwrap();
    let title = repo.create(org, title).await.unwrap();

    let users = SurrealUserRepository::new(db);
    users
        .create(CreateUser {
            organization_id: org,
            username: "dispatch".into(),
            email: "dispatch@example.com".into(),
            password: "correct-horse-battery".into(),
            first_name: String::new(),
            last_name: String::new(),
            job_title_id: Some(title.id),
            is_staff: false,
        })
        .await
        .unwrap();

    let err = repo.delete::<JobTitle>(org, title.id).await.unwrap_err();
    assert!(protected_by(err).contains("user"));
}

#[tokio::test]
async fn deleting_a_missing_record_is_not_found() {
    let repo = setup().await;
    let err = repo
        .delete::<Customer>(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, TmsError::NotFound { .. }));
}
