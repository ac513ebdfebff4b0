//! Generic CRUD endpoints for every organization-scoped [`Model`].
//!
//! All queries run against the caller's organization; payloads never choose
//! the organization a record belongs to.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::{Value, json};
use tms_core::error::TmsError;
use tms_core::models::location::Location;
use tms_core::models::route::Route;
use tms_core::models::{Entity, Model};
use tms_core::repository::{PaginatedResult, Pagination, RecordFilter, RecordRepository};
use tms_core::serializer::{Serializer, validate_references, validate_unique};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::state::AppState;

/// Largest page a list request may ask for.
pub const MAX_PAGE_SIZE: u64 = 500;

/// `GET|POST /{path}` and `GET|PUT|PATCH|DELETE /{path}/{id}` for `M`.
pub fn routes<M: Model>() -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("/{}", M::PATH), get(list::<M>).post(create::<M>))
        .route(
            &format!("/{}/{{id}}", M::PATH),
            get(retrieve::<M>)
                .put(update::<M>)
                .patch(partial_update::<M>)
                .delete(destroy::<M>),
        )
}

/// `offset` and `limit` from the query string.
pub(crate) fn pagination(params: &[(String, String)]) -> Result<Pagination, ApiError> {
    let mut pagination = Pagination::default();
    for (key, value) in params {
        let target = match key.as_str() {
            "offset" => &mut pagination.offset,
            "limit" => &mut pagination.limit,
            _ => continue,
        };
        *target = value
            .parse()
            .map_err(|_| TmsError::field(key, "A valid integer is required."))?;
    }
    if pagination.limit == 0 || pagination.limit > MAX_PAGE_SIZE {
        return Err(TmsError::field(
            "limit",
            format!("Ensure this value is between 1 and {MAX_PAGE_SIZE}."),
        )
        .into());
    }
    Ok(pagination)
}

/// Drop cached mileage once a write to `M` can change a distance.
pub(crate) fn after_write<M: Model>(state: &AppState) {
    if M::TABLE == Route::TABLE || M::TABLE == Location::TABLE {
        state.mileage.invalidate_cache();
    }
}

/// Render a page as `{count, offset, limit, results}`.
pub(crate) fn page_body<M: Model>(
    serializer: &Serializer<M>,
    page: &PaginatedResult<Entity<M>>,
) -> Result<Value, ApiError> {
    let results = page
        .items
        .iter()
        .map(|entity| serializer.to_representation(entity))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "count": page.total,
        "offset": page.offset,
        "limit": page.limit,
        "results": results,
    }))
}

pub(crate) async fn list<M: Model>(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let serializer = Serializer::<M>::new()?;
    let pagination = pagination(&params)?;
    let filter = RecordFilter::from_query(
        M::FIELDS,
        serializer.fields(),
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    let page = state
        .records()
        .list::<M>(user.organization_id, filter, pagination)
        .await?;
    Ok(Json(page_body(&serializer, &page)?))
}

pub(crate) async fn retrieve<M: Model>(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let entity = state
        .records()
        .get::<M>(user.organization_id, id)
        .await?;
    Ok(Json(Serializer::<M>::new()?.to_representation(&entity)?))
}

async fn create<M: Model>(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let serializer = Serializer::<M>::new()?;
    let validated = serializer.for_create(&payload, user.organization_id)?;
    let records = state.records();
    let mut data = validated.data;
    validate_references(&records, validated.organization_id, data.references()).await?;
    validate_unique(&records, validated.organization_id, &data, None).await?;

    if let Some(sequence) = M::SEQUENCE {
        let value = records
            .next_sequence(validated.organization_id, sequence)
            .await?;
        data.assign_sequence(value);
    }
    data.set_entered_by(user.user_id);

    let entity = records.create(validated.organization_id, data).await?;
    after_write::<M>(&state);
    info!(
        table = M::TABLE,
        id = %entity.id,
        organization_id = %entity.organization_id,
        user_id = %user.user_id,
        "Record created"
    );
    Ok((
        StatusCode::CREATED,
        Json(serializer.to_representation(&entity)?),
    ))
}

async fn save<M: Model>(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: &Value,
    partial: bool,
) -> Result<Json<Value>, ApiError> {
    let organization_id = user.0.organization_id;
    let serializer = Serializer::<M>::new()?;
    let records = state.records();
    let existing = records.get::<M>(organization_id, id).await?;
    let validated = serializer.for_update(payload, &existing, partial, organization_id)?;
    validate_references(&records, organization_id, validated.data.references()).await?;
    validate_unique(&records, organization_id, &validated.data, Some(id)).await?;
    let entity = records.update(organization_id, id, validated.data).await?;
    after_write::<M>(state);
    Ok(Json(serializer.to_representation(&entity)?))
}

async fn update<M: Model>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save::<M>(&state, &user, id, &payload, false).await
}

async fn partial_update<M: Model>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save::<M>(&state, &user, id, &payload, true).await
}

pub(crate) async fn destroy<M: Model>(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let records = state.records();
    let existing = records.get::<M>(user.organization_id, id).await?;
    existing.data.validate_delete()?;
    records.delete::<M>(user.organization_id, id).await?;
    after_write::<M>(&state);
    info!(table = M::TABLE, %id, user_id = %user.user_id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pagination_defaults_and_overrides() {
        let p = pagination(&params(&[("name", "x")])).unwrap();
        assert_eq!((p.offset, p.limit), (0, 50));

        let p = pagination(&params(&[("offset", "20"), ("limit", "10")])).unwrap();
        assert_eq!((p.offset, p.limit), (20, 10));
    }

    #[test]
    fn pagination_rejects_bad_values() {
        assert!(pagination(&params(&[("limit", "ten")])).is_err());
        assert!(pagination(&params(&[("limit", "0")])).is_err());
        assert!(pagination(&params(&[("limit", "501")])).is_err());
        assert!(pagination(&params(&[("offset", "-1")])).is_err());
    }
}
