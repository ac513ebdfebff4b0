//! Shared fixtures for API tests: an in-memory database, two users per
//! organization and a helper to drive the router.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tms_auth::AuthConfig;
use tms_core::models::organization::{CreateOrganization, OrganizationType};
use tms_core::models::user::CreateUser;
use tms_core::repository::{OrganizationRepository, UserRepository};
use tms_db::{DbConfig, DbManager};
use tms_dispatch::MileageConfig;
use tms_server::{AppState, router};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

/// An organization with a staff user and a regular user, both logged in.
pub struct Tenant {
    pub organization_id: Uuid,
    pub staff_id: Uuid,
    pub staff_token: String,
    pub clerk_id: Uuid,
    pub clerk_token: String,
}

pub async fn spawn() -> TestApp {
    let db = DbManager::connect(&DbConfig::in_memory()).await.unwrap();
    tms_db::run_migrations(db.client()).await.unwrap();
    let state = AppState::new(
        db.client().clone(),
        AuthConfig::default(),
        &MileageConfig::default(),
        None,
    );
    TestApp {
        router: router(Arc::clone(&state)),
        state,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Send `body` as-is, with `content_type` when given.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({"username": username, "password": password})),
        )
        .await
    }

    async fn add_user(&self, organization_id: Uuid, username: &str, is_staff: bool) -> (Uuid, String) {
        let user = self
            .state
            .users()
            .create(CreateUser {
                organization_id,
                username: username.into(),
                email: format!("{username}@example.com"),
                password: PASSWORD.into(),
                first_name: String::new(),
                last_name: String::new(),
                job_title_id: None,
                is_staff,
            })
            .await
            .unwrap();
        let (status, body) = self.login(username, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (user.id, body["token"].as_str().unwrap().to_string())
    }

    /// Create an organization whose users are `{prefix}-admin` and
    /// `{prefix}-clerk`.
    pub async fn tenant(&self, scac_code: &str) -> Tenant {
        let organization = self
            .state
            .organizations()
            .create(CreateOrganization {
                name: format!("{scac_code} Freight"),
                scac_code: scac_code.into(),
                dot_number: None,
                org_type: OrganizationType::Asset,
                timezone: "America/Chicago".into(),
                currency: "USD".into(),
                token_expiration_days: None,
            })
            .await
            .unwrap();

        let prefix = scac_code.to_lowercase();
        let (staff_id, staff_token) = self
            .add_user(organization.id, &format!("{prefix}-admin"), true)
            .await;
        let (clerk_id, clerk_token) = self
            .add_user(organization.id, &format!("{prefix}-clerk"), false)
            .await;

        Tenant {
            organization_id: organization.id,
            staff_id,
            staff_token,
            clerk_id,
            clerk_token,
        }
    }
}
