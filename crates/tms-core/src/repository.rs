//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Organization-scoped repositories
//! require an `organization_id` parameter to enforce data isolation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{TmsError, TmsResult};
use crate::models::{
    Control, Entity, Model,
    organization::{CreateOrganization, Organization, UpdateOrganization},
    token::{CreateToken, Token},
    user::{CreateUser, UpdateUser, User},
};
use crate::serializer::FieldSet;

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Equality filters on a model's stored fields.
///
/// Each field holds the values it may equal; a record matches when every
/// field equals one of its values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    conditions: BTreeMap<String, Vec<Value>>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.to_string(), vec![value.into()]);
        self
    }

    /// Build a filter from query-string pairs.
    ///
    /// Only writable or read-only model fields that are stored in the
    /// record body can be filtered on; other keys are ignored. A query
    /// string carries no type, so `true`, `false` and integers match both
    /// the text and the JSON value.
    pub fn from_query<'a>(
        model_fields: &[&'static str],
        fields: &FieldSet,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut filter = Self::new();
        for (key, raw) in params {
            if model_fields.contains(&key) && fields.is_readable(key) {
                filter.conditions.insert(key.to_string(), candidates(raw));
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Reject field names that could not be used as a query path.
    pub fn check(&self) -> TmsResult<()> {
        for field in self.conditions.keys() {
            if field.is_empty()
                || !field
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(TmsError::field(field, "Invalid filter field."));
            }
        }
        Ok(())
    }
}

/// Error for deleting a record other records still point at.
pub fn protected(referrer: &str) -> TmsError {
    TmsError::field(
        crate::validation::NON_FIELD_ERRORS,
        format!("Cannot delete this record because {referrer} records still reference it."),
    )
}

fn candidates(raw: &str) -> Vec<Value> {
    let text = Value::String(raw.to_string());
    match coerce(raw) {
        Value::String(_) => vec![text],
        typed => vec![text, typed],
    }
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Value::from(n),
            _ => Value::String(raw.to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// Organization (global scope)
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = TmsResult<Organization>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TmsResult<Organization>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> impl Future<Output = TmsResult<Organization>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = TmsResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TmsResult<PaginatedResult<Organization>>> + Send;
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = TmsResult<User>> + Send;
    fn get_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TmsResult<User>> + Send;
    /// Usernames are global, so login looks users up without an organization.
    fn get_by_username(&self, username: &str) -> impl Future<Output = TmsResult<User>> + Send;
    fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = TmsResult<User>> + Send;
    /// Store a new password; the raw password is hashed before storage.
    fn set_password(
        &self,
        organization_id: Uuid,
        id: Uuid,
        password: &str,
    ) -> impl Future<Output = TmsResult<()>> + Send;
    fn record_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = TmsResult<()>> + Send;
    /// Soft-delete: sets `is_active` to false.
    fn delete(&self, organization_id: Uuid, id: Uuid)
    -> impl Future<Output = TmsResult<()>> + Send;
    fn list(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = TmsResult<PaginatedResult<User>>> + Send;
}

pub trait TokenRepository: Send + Sync {
    fn create(&self, input: CreateToken) -> impl Future<Output = TmsResult<Token>> + Send;
    fn get_by_key_hash(&self, key_hash: &str) -> impl Future<Output = TmsResult<Token>> + Send;
    fn touch(&self, id: Uuid, at: DateTime<Utc>) -> impl Future<Output = TmsResult<()>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = TmsResult<()>> + Send;
    /// Delete every token of a user; returns how many were removed.
    fn delete_for_user(&self, user_id: Uuid) -> impl Future<Output = TmsResult<u64>> + Send;
    /// Delete tokens whose expiry has passed; returns how many were removed.
    fn cleanup_expired(&self, now: DateTime<Utc>)
    -> impl Future<Output = TmsResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Generic organization-scoped records
// ---------------------------------------------------------------------------

pub trait RecordRepository: Send + Sync {
    fn create<M: Model>(
        &self,
        organization_id: Uuid,
        data: M,
    ) -> impl Future<Output = TmsResult<Entity<M>>> + Send;
    fn get<M: Model>(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TmsResult<Entity<M>>> + Send;
    fn update<M: Model>(
        &self,
        organization_id: Uuid,
        id: Uuid,
        data: M,
    ) -> impl Future<Output = TmsResult<Entity<M>>> + Send;
    /// Delete a record, cascading to records declared to go with it.
    ///
    /// Fails with a validation error while a protecting reference to the
    /// record remains.
    fn delete<M: Model>(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TmsResult<()>> + Send;
    /// The first table holding a protecting reference to the record, if any.
    fn referenced_by(
        &self,
        table: &str,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TmsResult<Option<&'static str>>> + Send;
    fn list<M: Model>(
        &self,
        organization_id: Uuid,
        filter: RecordFilter,
        pagination: Pagination,
    ) -> impl Future<Output = TmsResult<PaginatedResult<Entity<M>>>> + Send;
    /// Whether a record with `id` exists in `table` for the organization.
    fn exists(
        &self,
        table: &str,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TmsResult<bool>> + Send;
    /// Increment and return a per-organization named counter, starting at 1.
    fn next_sequence(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> impl Future<Output = TmsResult<u64>> + Send;
}

pub trait ControlRepository: Send + Sync {
    /// Load the organization's control row, creating it with defaults.
    fn get_or_init<C: Control>(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = TmsResult<C>> + Send;
    fn update<C: Control>(
        &self,
        organization_id: Uuid,
        control: C,
    ) -> impl Future<Output = TmsResult<C>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::FieldSpec;

    #[test]
    fn query_filter_keeps_only_model_fields() {
        let fields = FieldSet::compose(&["name", "is_active", "count"], &FieldSpec::ALL).unwrap();
        let filter = RecordFilter::from_query(
            &["name", "is_active", "count"],
            &fields,
            [
                ("name", "Bolt"),
                ("is_active", "true"),
                ("count", "12"),
                ("offset", "5"),
                ("organization_id", "x"),
            ],
        );
        let conditions: Vec<_> = filter.conditions().collect();
        assert_eq!(conditions.len(), 3);
        assert!(conditions.contains(&("name", &[Value::from("Bolt")][..])));
        assert!(conditions.contains(&("is_active", &[Value::from("true"), Value::Bool(true)][..])));
        assert!(conditions.contains(&("count", &[Value::from("12"), Value::from(12)][..])));
    }

    #[test]
    fn digit_only_text_keeps_its_string_form() {
        assert_eq!(
            candidates("38118"),
            vec![Value::from("38118"), Value::from(38118)]
        );
        assert_eq!(candidates("007"), vec![Value::from("007")]);
    }

    #[test]
    fn non_canonical_numbers_stay_strings() {
        assert_eq!(coerce("007"), Value::from("007"));
        assert_eq!(coerce("-3"), Value::from(-3));
        assert_eq!(coerce("True"), Value::from("True"));
    }

    #[test]
    fn check_rejects_odd_field_names() {
        assert!(RecordFilter::new().eq("name", "x").check().is_ok());
        assert!(RecordFilter::new().eq("data.name", "x").check().is_err());
        assert!(RecordFilter::new().eq("", "x").check().is_err());
    }

    #[test]
    fn default_pagination() {
        let p = Pagination::default();
        assert_eq!((p.offset, p.limit), (0, 50));
    }
}
