//! Generic serializer: field composition and organization scoping.
//!
//! Every [`Model`] is read and written through a [`Serializer`]. The
//! readable, writable and read-only field sets are composed once from the
//! model's introspected [`Model::FIELDS`] and its [`FieldSpec`]. Writes never
//! take the organization from the payload: [`Serializer::for_create`] and
//! [`Serializer::for_update`] attach the caller's organization to the
//! validated data.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{TmsError, TmsResult};
use crate::models::{COMMON_FIELDS, Entity, Model, Reference};
use crate::repository::{Pagination, RecordFilter, RecordRepository};
use crate::validation::ValidationErrors;

pub const REQUIRED: &str = "This field is required.";
pub const DOES_NOT_EXIST: &str = "Object does not exist.";
pub const NOT_UNIQUE: &str = "A record with this value already exists.";

/// Serializer configuration for a model.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Explicit field list. `None` means every model field.
    pub fields: Option<&'static [&'static str]>,
    /// Computed fields added to the representation.
    pub extra_fields: &'static [&'static str],
    /// Declared fields that cannot be written.
    pub read_only_fields: &'static [&'static str],
    /// Additional fields exposed read-only.
    pub extra_read_only_fields: &'static [&'static str],
}

impl FieldSpec {
    pub const ALL: FieldSpec = FieldSpec {
        fields: None,
        extra_fields: &[],
        read_only_fields: &[],
        extra_read_only_fields: &[],
    };
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self::ALL
    }
}

/// The composed field sets of a serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    readable: BTreeSet<&'static str>,
    read_only: BTreeSet<&'static str>,
    /// `extra_fields`: rendered from [`Model::computed_fields`], never stored.
    computed: BTreeSet<&'static str>,
}

impl FieldSet {
    /// Compose field sets from the model's own fields and a [`FieldSpec`].
    ///
    /// Fails when the `FieldSpec` names a field that is neither a model field, a
    /// common field nor an extra field.
    pub fn compose(model_fields: &[&'static str], spec: &FieldSpec) -> TmsResult<Self> {
        let known: BTreeSet<&'static str> = model_fields
            .iter()
            .chain(COMMON_FIELDS.iter())
            .chain(spec.extra_fields.iter())
            .chain(spec.extra_read_only_fields.iter())
            .copied()
            .collect();

        let named = spec
            .fields
            .unwrap_or(&[])
            .iter()
            .chain(spec.read_only_fields.iter());
        for field in named {
            if !known.contains(field) {
                return Err(TmsError::Internal(format!(
                    "serializer field `{field}` is not a model field or extra field"
                )));
            }
        }

        let declared: BTreeSet<&'static str> = match spec.fields {
            Some(fields) => fields.iter().copied().collect(),
            None => model_fields
                .iter()
                .chain(COMMON_FIELDS.iter())
                .copied()
                .collect(),
        };

        let read_only: BTreeSet<&'static str> = spec
            .read_only_fields
            .iter()
            .chain(spec.extra_read_only_fields.iter())
            .chain(COMMON_FIELDS.iter())
            .copied()
            .collect();

        let computed: BTreeSet<&'static str> = spec
            .extra_fields
            .iter()
            .copied()
            .filter(|f| !model_fields.contains(f))
            .collect();

        let readable = declared
            .into_iter()
            .chain(spec.extra_fields.iter().copied())
            .chain(read_only.iter().copied())
            .collect();

        Ok(Self {
            readable,
            read_only,
            computed,
        })
    }

    pub fn for_model<M: Model>() -> TmsResult<Self> {
        Self::compose(M::FIELDS, &M::field_spec())
    }

    pub fn is_readable(&self, field: &str) -> bool {
        self.readable.contains(field)
    }

    pub fn is_read_only(&self, field: &str) -> bool {
        self.read_only.contains(field)
    }

    /// Whether the field is rendered but never stored.
    pub fn is_computed(&self, field: &str) -> bool {
        self.computed.contains(field)
    }

    pub fn is_writable(&self, field: &str) -> bool {
        self.is_readable(field) && !self.is_read_only(field) && !self.is_computed(field)
    }

    pub fn readable(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.readable.iter().copied()
    }

    pub fn writable(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.readable
            .iter()
            .copied()
            .filter(|f| self.is_writable(f))
    }
}

/// Validated write data with the organization attached.
#[derive(Debug, Clone)]
pub struct Validated<M> {
    pub organization_id: Uuid,
    pub data: M,
}

/// Reads and writes one [`Model`] type.
#[derive(Debug, Clone)]
pub struct Serializer<M> {
    fields: FieldSet,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Serializer<M> {
    pub fn new() -> TmsResult<Self> {
        Ok(Self {
            fields: FieldSet::for_model::<M>()?,
            _model: PhantomData,
        })
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Render an entity as a JSON object limited to the readable fields.
    pub fn to_representation(&self, entity: &Entity<M>) -> TmsResult<Value> {
        let value = serde_json::to_value(entity)
            .map_err(|e| TmsError::Internal(format!("serialize {}: {e}", M::TABLE)))?;
        let Value::Object(mut map) = value else {
            return Err(TmsError::Internal(format!(
                "{} did not serialize to an object",
                M::TABLE
            )));
        };
        map.extend(entity.data.computed_fields());
        map.retain(|key, _| self.fields.is_readable(key));
        Ok(Value::Object(map))
    }

    /// Overlay the writable keys of `payload` onto `base` and deserialize.
    ///
    /// Read-only and unknown keys in the payload are ignored. Model rules are
    /// not checked here; [`Serializer::for_create`] and
    /// [`Serializer::for_update`] run [`Model::validate`] on the result.
    pub fn to_internal_value(
        &self,
        payload: &Value,
        mut base: Map<String, Value>,
    ) -> Result<M, ValidationErrors> {
        let Value::Object(input) = payload else {
            let mut errors = ValidationErrors::new();
            errors.add_non_field("Invalid data. Expected a dictionary.");
            return Err(errors);
        };

        for (key, value) in input {
            if self.fields.is_writable(key) {
                base.insert(key.clone(), value.clone());
            }
        }
        base.retain(|key, _| !COMMON_FIELDS.contains(&key.as_str()));

        serde_json::from_value(Value::Object(base)).map_err(deserialize_errors)
    }

    /// Stored values an update payload is overlaid on.
    ///
    /// A partial update keeps every stored value the payload omits. A full
    /// update keeps only the stored read-only and hidden values, so omitted
    /// writable fields fall back to their defaults or are reported as
    /// required.
    pub fn update_base(&self, existing: &Entity<M>, partial: bool) -> TmsResult<Map<String, Value>> {
        let Value::Object(mut base) = serde_json::to_value(&existing.data)
            .map_err(|e| TmsError::Internal(format!("serialize {}: {e}", M::TABLE)))?
        else {
            return Err(TmsError::Internal(format!(
                "{} did not serialize to an object",
                M::TABLE
            )));
        };
        if !partial {
            base.retain(|key, _| self.fields.is_read_only(key) || !self.fields.is_readable(key));
        }
        Ok(base)
    }

    /// Validate a create payload for `organization_id`.
    pub fn for_create(
        &self,
        payload: &Value,
        organization_id: Uuid,
    ) -> Result<Validated<M>, ValidationErrors> {
        let data = self.to_internal_value(payload, Map::new())?;
        data.validate()?;
        Ok(Validated {
            organization_id,
            data,
        })
    }

    /// Validate an update payload against the stored entity.
    pub fn for_update(
        &self,
        payload: &Value,
        existing: &Entity<M>,
        partial: bool,
        organization_id: Uuid,
    ) -> TmsResult<Validated<M>> {
        let base = self.update_base(existing, partial)?;
        let data = self.to_internal_value(payload, base)?;
        data.validate()?;
        Ok(Validated {
            organization_id,
            data,
        })
    }
}

/// Turn a serde failure into field errors.
pub fn deserialize_errors(err: serde_json::Error) -> ValidationErrors {
    let message = err.to_string();
    let mut errors = ValidationErrors::new();
    match missing_field(&message) {
        Some(field) => errors.add(field, REQUIRED),
        None => errors.add_non_field(message),
    }
    errors
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

/// Check that every reference exists in `organization_id`.
///
/// Pass [`Model::references`] or [`Control::references`](crate::models::Control::references).
pub async fn validate_references<R>(
    repo: &R,
    organization_id: Uuid,
    references: impl IntoIterator<Item = Reference>,
) -> TmsResult<()>
where
    R: RecordRepository,
{
    let mut errors = ValidationErrors::new();
    for reference in references {
        if !repo
            .exists(reference.table, organization_id, reference.id)
            .await?
        {
            errors.add(reference.field, DOES_NOT_EXIST);
        }
    }
    errors.into_result().map_err(TmsError::from)
}

/// Check the model's unique fields against the organization's other rows.
///
/// `current` is the id of the record being saved, absent on create.
/// Null and empty values are not compared.
pub async fn validate_unique<R, M>(
    repo: &R,
    organization_id: Uuid,
    data: &M,
    current: Option<Uuid>,
) -> TmsResult<()>
where
    R: RecordRepository,
    M: Model,
{
    if M::UNIQUE_FIELDS.is_empty() {
        return Ok(());
    }
    let Value::Object(body) = serde_json::to_value(data)
        .map_err(|e| TmsError::Internal(format!("{}: {e}", M::TABLE)))?
    else {
        return Ok(());
    };

    let mut errors = ValidationErrors::new();
    for field in M::UNIQUE_FIELDS {
        let value = match body.get(*field) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.is_empty() => continue,
            Some(value) => value.clone(),
        };
        let page = repo
            .list::<M>(
                organization_id,
                RecordFilter::new().eq(field, value),
                Pagination {
                    offset: 0,
                    limit: 2,
                },
            )
            .await?;
        if page.items.iter().any(|other| Some(other.id) != current) {
            errors.add(field, NOT_UNIQUE);
        }
    }
    errors.into_result().map_err(TmsError::from)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Widget {
        name: String,
        #[serde(default)]
        code: String,
        #[serde(default)]
        count: u32,
        #[serde(default)]
        serial: String,
    }

    impl Model for Widget {
        const TABLE: &'static str = "widget";
        const PATH: &'static str = "widgets";
        const FIELDS: &'static [&'static str] = &["name", "code", "count", "serial"];

        fn field_spec() -> FieldSpec {
            FieldSpec {
                fields: None,
                extra_fields: &["label"],
                read_only_fields: &["serial"],
                extra_read_only_fields: &[],
            }
        }

        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            if self.count > 100 {
                errors.add("count", "Ensure this value is less than or equal to 100.");
            }
            errors.into_result()
        }

        fn computed_fields(&self) -> Map<String, Value> {
            let mut map = Map::new();
            map.insert("label".into(), json!(format!("{}-{}", self.code, self.name)));
            map
        }
    }

    fn entity(data: Widget) -> Entity<Widget> {
        let now = Utc::now();
        Entity {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            data,
        }
    }

    fn widget() -> Widget {
        Widget {
            name: "Bolt".into(),
            code: "B1".into(),
            count: 3,
            serial: "S-1".into(),
        }
    }

    #[test]
    fn compose_merges_model_extra_and_read_only_fields() {
        let set = FieldSet::for_model::<Widget>().unwrap();
        for field in ["name", "code", "count", "serial", "label", "id", "organization_id"] {
            assert!(set.is_readable(field), "{field} should be readable");
        }
        for field in ["serial", "id", "organization_id", "created_at", "updated_at"] {
            assert!(set.is_read_only(field), "{field} should be read-only");
        }
        let writable: Vec<_> = set.writable().collect();
        assert_eq!(writable, vec!["code", "count", "name"]);
        assert!(set.is_computed("label"));
        assert!(!set.is_writable("label"));
    }

    #[test]
    fn explicit_fields_limit_the_representation() {
        let spec = FieldSpec {
            fields: Some(&["name"]),
            ..FieldSpec::ALL
        };
        let set = FieldSet::compose(Widget::FIELDS, &spec).unwrap();
        assert!(set.is_readable("name"));
        assert!(!set.is_readable("code"));
        assert!(set.is_readable("id"));
    }

    #[test]
    fn unknown_explicit_field_is_a_configuration_error() {
        let spec = FieldSpec {
            fields: Some(&["name", "nope"]),
            ..FieldSpec::ALL
        };
        assert!(matches!(
            FieldSet::compose(Widget::FIELDS, &spec),
            Err(TmsError::Internal(_))
        ));
    }

    #[test]
    fn representation_includes_computed_and_common_fields() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let e = entity(widget());
        let value = serializer.to_representation(&e).unwrap();
        assert_eq!(value["label"], "B1-Bolt");
        assert_eq!(value["id"], json!(e.id));
        assert_eq!(value["organization_id"], json!(e.organization_id));
        assert_eq!(value["serial"], "S-1");
    }

    #[test]
    fn create_ignores_organization_and_read_only_keys_in_payload() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let org = Uuid::new_v4();
        let payload = json!({
            "name": "Nut",
            "serial": "forged",
            "organization_id": Uuid::new_v4(),
            "id": Uuid::new_v4(),
            "unknown": true,
        });
        let validated = serializer.for_create(&payload, org).unwrap();
        assert_eq!(validated.organization_id, org);
        assert_eq!(validated.data.name, "Nut");
        assert_eq!(validated.data.serial, "");
    }

    #[test]
    fn missing_required_field_is_reported_on_that_field() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let errors = serializer
            .for_create(&json!({"code": "X"}), Uuid::new_v4())
            .unwrap_err();
        assert_eq!(errors.messages("name"), [REQUIRED.to_string()]);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let errors = serializer
            .for_create(&json!(["name"]), Uuid::new_v4())
            .unwrap_err();
        assert!(errors.contains(crate::validation::NON_FIELD_ERRORS));
    }

    #[test]
    fn intrinsic_validation_runs_after_deserialize() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let errors = serializer
            .for_create(&json!({"name": "N", "count": 101}), Uuid::new_v4())
            .unwrap_err();
        assert!(errors.contains("count"));
    }

    #[test]
    fn partial_update_keeps_omitted_values() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let existing = entity(widget());
        let org = existing.organization_id;
        let validated = serializer
            .for_update(&json!({"count": 7}), &existing, true, org)
            .unwrap();
        assert_eq!(validated.data.name, "Bolt");
        assert_eq!(validated.data.code, "B1");
        assert_eq!(validated.data.count, 7);
        assert_eq!(validated.data.serial, "S-1");
    }

    #[test]
    fn full_update_resets_omitted_writable_fields_but_keeps_read_only() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let existing = entity(widget());
        let org = existing.organization_id;
        let validated = serializer
            .for_update(&json!({"name": "Washer"}), &existing, false, org)
            .unwrap();
        assert_eq!(validated.data.name, "Washer");
        assert_eq!(validated.data.code, "");
        assert_eq!(validated.data.count, 0);
        assert_eq!(validated.data.serial, "S-1");
    }

    #[test]
    fn full_update_requires_required_fields() {
        let serializer = Serializer::<Widget>::new().unwrap();
        let existing = entity(widget());
        let org = existing.organization_id;
        let err = serializer
            .for_update(&json!({"count": 1}), &existing, false, org)
            .unwrap_err();
        match err {
            TmsError::Validation(errors) => assert!(errors.contains("name")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
