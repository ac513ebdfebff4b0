//! Integration tests for organization, user and token repositories.

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tms_core::error::TmsError;
use tms_core::models::organization::{CreateOrganization, OrganizationType, UpdateOrganization};
use tms_core::models::token::CreateToken;
use tms_core::models::user::{CreateUser, UpdateUser};
use tms_core::repository::{
    OrganizationRepository, Pagination, TokenRepository, UserRepository,
};
use tms_db::repository::{
    SurrealOrganizationRepository, SurrealTokenRepository, SurrealUserRepository,
};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tms_db::run_migrations(&db).await.unwrap();
    db
}

fn org_input(scac: &str) -> CreateOrganization {
    CreateOrganization {
        name: format!("{scac} Freight"),
        scac_code: scac.into(),
        dot_number: Some(123456),
        org_type: OrganizationType::Asset,
        timezone: "America/Chicago".into(),
        currency: "USD".into(),
        token_expiration_days: None,
    }
}

fn user_input(organization_id: Uuid, username: &str) -> CreateUser {
    CreateUser {
        organization_id,
        username: username.into(),
        email: format!("{username}@example.com"),
        password: "correct-horse".into(),
        first_name: "Pat".into(),
        last_name: "Driver".into(),
        job_title_id: None,
        is_staff: false,
    }
}

#[tokio::test]
async fn organization_crud() {
    let db = setup().await;
    let repo = SurrealOrganizationRepository::new(db);

    let org = repo.create(org_input("ACME")).await.unwrap();
    assert_eq!(org.token_expiration_days, 30);
    assert_eq!(org.dot_number, Some(123456));

    let fetched = repo.get_by_id(org.id).await.unwrap();
    assert_eq!(fetched.scac_code, "ACME");
    assert_eq!(fetched.org_type, OrganizationType::Asset);

    let updated = repo
        .update(
            org.id,
            UpdateOrganization {
                name: Some("Acme Logistics".into()),
                dot_number: Some(None),
                org_type: Some(OrganizationType::Both),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Acme Logistics");
    assert_eq!(updated.dot_number, None);
    assert_eq!(updated.org_type, OrganizationType::Both);
    assert_eq!(updated.timezone, "America/Chicago");

    let page = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);

    repo.delete(org.id).await.unwrap();
    assert!(matches!(
        repo.get_by_id(org.id).await,
        Err(TmsError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete(org.id).await,
        Err(TmsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn duplicate_scac_code_is_rejected() {
    let db = setup().await;
    let repo = SurrealOrganizationRepository::new(db);

    repo.create(org_input("DUPE")).await.unwrap();
    let err = repo.create(org_input("DUPE")).await.unwrap_err();
    assert!(matches!(err, TmsError::AlreadyExists { .. }), "{err:?}");
}

#[tokio::test]
async fn user_password_is_hashed_and_username_is_global() {
    let db = setup().await;
    let orgs = SurrealOrganizationRepository::new(db.clone());
    let users = SurrealUserRepository::with_pepper(db, "pepper".into());

    let a = orgs.create(org_input("AAA")).await.unwrap();
    let b = orgs.create(org_input("BBB")).await.unwrap();

    let user = users.create(user_input(a.id, "pat")).await.unwrap();
    assert!(user.password_hash.starts_with("$argon2id$"));
    assert_ne!(user.password_hash, "correct-horse");
    assert!(user.is_active);
    assert!(!user.is_staff);

    let err = users.create(user_input(b.id, "pat")).await.unwrap_err();
    assert!(matches!(err, TmsError::AlreadyExists { .. }), "{err:?}");

    let by_name = users.get_by_username("pat").await.unwrap();
    assert_eq!(by_name.id, user.id);
    assert_eq!(by_name.organization_id, a.id);

    assert!(matches!(
        users.get_by_id(b.id, user.id).await,
        Err(TmsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn user_update_soft_delete_and_password_change() {
    let db = setup().await;
    let orgs = SurrealOrganizationRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let org = orgs.create(org_input("UPD")).await.unwrap();
    let user = users.create(user_input(org.id, "casey")).await.unwrap();

    let job_title = Uuid::new_v4();
    let updated = users
        .update(
            org.id,
            user.id,
            UpdateUser {
                first_name: Some("Casey".into()),
                job_title_id: Some(Some(job_title)),
                is_staff: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name(), "Casey Driver");
    assert_eq!(updated.job_title_id, Some(job_title));
    assert!(updated.is_staff);

    users
        .set_password(org.id, user.id, "new-password")
        .await
        .unwrap();
    let reloaded = users.get_by_id(org.id, user.id).await.unwrap();
    assert_ne!(reloaded.password_hash, user.password_hash);

    let now = Utc::now();
    users.record_login(user.id, now).await.unwrap();
    let reloaded = users.get_by_id(org.id, user.id).await.unwrap();
    assert!(reloaded.last_login.is_some());

    users.delete(org.id, user.id).await.unwrap();
    let reloaded = users.get_by_id(org.id, user.id).await.unwrap();
    assert!(!reloaded.is_active);

    let page = users.list(org.id, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);

    assert!(matches!(
        users.delete(org.id, Uuid::new_v4()).await,
        Err(TmsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn tokens_are_found_by_hash_and_cleaned_up() {
    let db = setup().await;
    let tokens = SurrealTokenRepository::new(db);
    let user_id = Uuid::new_v4();
    let organization_id = Uuid::new_v4();
    let now = Utc::now();

    let live = tokens
        .create(CreateToken {
            user_id,
            organization_id,
            key_hash: "hash-live".into(),
            key_prefix: "live000000".into(),
            expires_at: Some(now + Duration::days(1)),
        })
        .await
        .unwrap();
    tokens
        .create(CreateToken {
            user_id,
            organization_id,
            key_hash: "hash-expired".into(),
            key_prefix: "dead000000".into(),
            expires_at: Some(now - Duration::days(1)),
        })
        .await
        .unwrap();
    tokens
        .create(CreateToken {
            user_id: Uuid::new_v4(),
            organization_id,
            key_hash: "hash-forever".into(),
            key_prefix: "ever000000".into(),
            expires_at: None,
        })
        .await
        .unwrap();

    let found = tokens.get_by_key_hash("hash-live").await.unwrap();
    assert_eq!(found.id, live.id);
    assert_eq!(found.user_id, user_id);
    assert!(found.last_used.is_none());

    tokens.touch(live.id, now).await.unwrap();
    let found = tokens.get_by_key_hash("hash-live").await.unwrap();
    assert!(found.last_used.is_some());

    assert_eq!(tokens.cleanup_expired(now).await.unwrap(), 1);
    assert!(tokens.get_by_key_hash("hash-expired").await.is_err());
    assert!(tokens.get_by_key_hash("hash-forever").await.is_ok());

    assert_eq!(tokens.delete_for_user(user_id).await.unwrap(), 1);
    assert!(matches!(
        tokens.get_by_key_hash("hash-live").await,
        Err(TmsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn duplicate_key_hash_is_rejected() {
    let db = setup().await;
    let tokens = SurrealTokenRepository::new(db);
    let input = CreateToken {
        user_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        key_hash: "same".into(),
        key_prefix: "same000000".into(),
        expires_at: None,
    };
    tokens.create(input.clone()).await.unwrap();
    assert!(matches!(
        tokens.create(input).await,
        Err(TmsError::AlreadyExists { .. })
    ));
}
