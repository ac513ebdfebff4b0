//! Domain models for the TMS backend.
//!
//! [`Organization`](organization::Organization), [`User`](user::User) and
//! [`Token`](token::Token) are typed records with dedicated repositories.
//! Everything else is an organization-scoped [`Model`] persisted through the
//! generic record repository and exposed through the generic viewsets.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::serializer::FieldSpec;
use crate::validation::ValidationErrors;

pub mod accounting;
pub mod billing;
pub mod controls;
pub mod customer;
pub mod dispatch;
pub mod equipment;
pub mod location;
pub mod movement;
pub mod organization;
pub mod route;
pub mod shipment;
pub mod token;
pub mod user;
pub mod worker;

/// Fields every persisted [`Entity`] carries in addition to its model fields.
pub const COMMON_FIELDS: [&str; 4] = ["id", "organization_id", "created_at", "updated_at"];

/// An organization-scoped domain record.
///
/// `FIELDS` lists the struct's own serialized field names; together with
/// [`COMMON_FIELDS`] it is what the serializer treats as the model's
/// introspected field list.
pub trait Model: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Storage table name.
    const TABLE: &'static str;
    /// URL path segment under `/api`.
    const PATH: &'static str;
    /// Serialized field names of the model struct.
    const FIELDS: &'static [&'static str];

    /// Foreign keys held in the model's fields.
    const FOREIGN_KEYS: &'static [ForeignKey] = &[];

    /// Fields whose value must be unique inside an organization.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    /// Name of the per-organization counter that numbers new records.
    const SEQUENCE: Option<&'static str> = None;

    /// Serializer configuration for this model.
    fn field_spec() -> FieldSpec {
        FieldSpec::ALL
    }

    /// Intrinsic field rules that need no database access.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// Rules that can block deleting a stored record.
    fn validate_delete(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// Foreign keys that must resolve inside the same organization.
    fn references(&self) -> Vec<Reference> {
        references_from(self, Self::FOREIGN_KEYS)
    }

    /// Store the number drawn from [`Model::SEQUENCE`] on a new record.
    fn assign_sequence(&mut self, _value: u64) {}

    /// Record the user creating the record.
    fn set_entered_by(&mut self, _user_id: Uuid) {}

    /// Values for the serializer's `extra_fields`.
    fn computed_fields(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// Serde default for flags that start out enabled.
pub(crate) fn default_true() -> bool {
    true
}

/// Digits a stored amount may carry before the decimal point.
pub const AMOUNT_DIGITS: u32 = 15;

/// Whether `value` fits an amount column.
pub fn amount_fits(value: Decimal) -> bool {
    value.abs() < Decimal::from(10_i64.pow(AMOUNT_DIGITS))
}

pub fn amount_too_large() -> String {
    format!("Ensure that there are no more than {AMOUNT_DIGITS} digits before the decimal point.")
}

/// Record an error on `field` when `value` does not fit an amount column.
pub(crate) fn check_amount(errors: &mut ValidationErrors, field: &str, value: Decimal) {
    if !amount_fits(value) {
        errors.add(field, amount_too_large());
    }
}

/// What deleting a referenced record does to the records pointing at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// The delete is refused while any referrer exists.
    Protect,
    /// Referrers are deleted along with the record.
    Cascade,
}

/// A declared foreign key: `field` holds the id of a row in `table`.
///
/// The field holds a single, possibly optional, id unless `many` is set,
/// in which case it holds a list of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub table: &'static str,
    pub on_delete: OnDelete,
    pub many: bool,
}

impl ForeignKey {
    pub const fn protect(field: &'static str, table: &'static str) -> Self {
        Self {
            field,
            table,
            on_delete: OnDelete::Protect,
            many: false,
        }
    }

    pub const fn cascade(field: &'static str, table: &'static str) -> Self {
        Self {
            field,
            table,
            on_delete: OnDelete::Cascade,
            many: false,
        }
    }

    /// The same key over a list of ids.
    pub const fn many(self) -> Self {
        Self { many: true, ..self }
    }
}

/// Where a referring row keeps its foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLocation {
    /// Inside the serialized body of a generic model or control row.
    Body,
    /// In a column of a typed table.
    Column,
}

/// A table holding a foreign key to some other table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referrer {
    pub table: &'static str,
    pub key: ForeignKey,
    pub location: KeyLocation,
}

/// Read the ids named by `keys` out of a serialized value.
pub fn references_from<T: Serialize>(value: &T, keys: &[ForeignKey]) -> Vec<Reference> {
    if keys.is_empty() {
        return Vec::new();
    }
    let Ok(Value::Object(map)) = serde_json::to_value(value) else {
        return Vec::new();
    };
    let mut references = Vec::new();
    for key in keys {
        let ids: Vec<&Value> = match map.get(key.field) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        };
        references.extend(
            ids.into_iter()
                .filter_map(Value::as_str)
                .filter_map(|id| Uuid::parse_str(id).ok())
                .map(|id| Reference::new(key.field, key.table, id)),
        );
    }
    references
}

/// A foreign key held by a [`Model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub table: &'static str,
    pub id: Uuid,
}

impl Reference {
    pub fn new(field: &'static str, table: &'static str, id: Uuid) -> Self {
        Self { field, table, id }
    }

    pub fn optional(field: &'static str, table: &'static str, id: Option<Uuid>) -> Option<Self> {
        id.map(|id| Self::new(field, table, id))
    }
}

/// A persisted [`Model`] with its identity and tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity<M> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: M,
}

/// A per-organization singleton configuration row.
///
/// Controls are created with their `Default` values the first time an
/// organization reads them.
pub trait Control:
    Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static
{
    /// Storage table name.
    const TABLE: &'static str;
    /// Path segment under `/api/controls`.
    const KIND: &'static str;

    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// Foreign keys held in the control's fields.
    const FOREIGN_KEYS: &'static [ForeignKey] = &[];

    /// Foreign keys that must resolve inside the same organization.
    fn references(&self) -> Vec<Reference> {
        references_from(self, Self::FOREIGN_KEYS)
    }
}

/// Table, foreign keys and unique fields of every generic model.
fn model_tables() -> Vec<(&'static str, &'static [ForeignKey], &'static [&'static str])> {
    use self::accounting::{GeneralLedgerAccount, RevenueCode};
    use self::billing::{
        AccessorialCharge, BillingException, BillingHistory, BillingQueue, BillingTransferLog,
        ChargeType, DocumentClassification,
    };
    use self::customer::{Customer, CustomerBillingProfile, CustomerContact};
    use self::dispatch::{CommentType, DelayCode, FleetCode, Rate};
    use self::equipment::{
        EquipmentMaintenancePlan, EquipmentManufacturer, EquipmentType, Tractor, Trailer,
    };
    use self::location::{Location, LocationCategory};
    use self::movement::{Movement, Stop};
    use self::organization::Depot;
    use self::route::Route;
    use self::shipment::{
        AdditionalCharge, Commodity, ReasonCode, ServiceType, Shipment, ShipmentType,
    };
    use self::user::JobTitle;
    use self::worker::{Worker, WorkerComment, WorkerContact, WorkerProfile, WorkerTimeAway};

    macro_rules! tables {
        ($($model:ty),* $(,)?) => {
            vec![$((
                <$model as Model>::TABLE,
                <$model as Model>::FOREIGN_KEYS,
                <$model as Model>::UNIQUE_FIELDS,
            )),*]
        };
    }

    tables![
        Depot,
        JobTitle,
        GeneralLedgerAccount,
        RevenueCode,
        ChargeType,
        AccessorialCharge,
        DocumentClassification,
        Customer,
        CustomerBillingProfile,
        CustomerContact,
        CommentType,
        DelayCode,
        FleetCode,
        Rate,
        EquipmentType,
        Tractor,
        Trailer,
        LocationCategory,
        Location,
        ShipmentType,
        ServiceType,
        Commodity,
        Shipment,
        AdditionalCharge,
        ReasonCode,
        Route,
        Worker,
        WorkerProfile,
        WorkerContact,
        WorkerComment,
        WorkerTimeAway,
        EquipmentManufacturer,
        EquipmentMaintenancePlan,
        Movement,
        Stop,
        BillingQueue,
        BillingTransferLog,
        BillingHistory,
        BillingException,
    ]
}

/// Every table holding foreign keys, with the keys it holds.
///
/// Generic models and controls keep their keys in the stored body; the
/// typed user table keeps `job_title_id` in a column.
fn key_holders() -> Vec<(&'static str, &'static [ForeignKey], KeyLocation)> {
    use self::controls::{
        AccountingControl, BillingControl, DispatchControl, RouteControl, ShipmentControl,
    };
    use self::user::JobTitle;

    const USER_KEYS: &[ForeignKey] = &[ForeignKey::protect("job_title_id", JobTitle::TABLE)];

    let mut holders = vec![("user", USER_KEYS, KeyLocation::Column)];
    holders.extend(
        model_tables()
            .into_iter()
            .map(|(table, keys, _)| (table, keys, KeyLocation::Body)),
    );
    holders.extend([
        (AccountingControl::TABLE, AccountingControl::FOREIGN_KEYS, KeyLocation::Body),
        (BillingControl::TABLE, BillingControl::FOREIGN_KEYS, KeyLocation::Body),
        (DispatchControl::TABLE, DispatchControl::FOREIGN_KEYS, KeyLocation::Body),
        (RouteControl::TABLE, RouteControl::FOREIGN_KEYS, KeyLocation::Body),
        (ShipmentControl::TABLE, ShipmentControl::FOREIGN_KEYS, KeyLocation::Body),
    ]);
    holders
}

/// `(table, field)` for every value that is unique per organization.
pub fn unique_fields() -> Vec<(&'static str, &'static str)> {
    model_tables()
        .into_iter()
        .flat_map(|(table, _, fields)| fields.iter().map(move |field| (table, *field)))
        .collect()
}

/// Every foreign key pointing at rows of `table`.
pub fn referrers(table: &str) -> Vec<Referrer> {
    key_holders()
        .into_iter()
        .flat_map(|(holder, keys, location)| {
            keys.iter().map(move |key| Referrer {
                table: holder,
                key: *key,
                location,
            })
        })
        .filter(|referrer| referrer.key.table == table)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_are_protected_by_shipments_and_cascade_to_routes() {
        let referrers = referrers(location::Location::TABLE);
        let shipment = referrers
            .iter()
            .find(|r| r.table == shipment::Shipment::TABLE && r.key.field == "origin_location_id")
            .unwrap();
        assert_eq!(shipment.key.on_delete, OnDelete::Protect);
        assert_eq!(shipment.location, KeyLocation::Body);

        let routes: Vec<_> = referrers
            .iter()
            .filter(|r| r.table == route::Route::TABLE)
            .collect();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.key.on_delete == OnDelete::Cascade));
    }

    #[test]
    fn job_titles_are_held_by_user_columns() {
        let referrers = referrers(user::JobTitle::TABLE);
        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].table, "user");
        assert_eq!(referrers[0].location, KeyLocation::Column);
    }

    #[test]
    fn controls_hold_account_keys() {
        let referrers = referrers(accounting::GeneralLedgerAccount::TABLE);
        assert!(referrers.iter().any(|r| r.table == controls::AccountingControl::TABLE));
        assert!(referrers.iter().any(|r| r.table == accounting::RevenueCode::TABLE));
        assert!(referrers.iter().any(|r| r.table == accounting::GeneralLedgerAccount::TABLE));
    }

    #[test]
    fn unique_fields_cover_codes() {
        let unique = unique_fields();
        assert!(unique.contains(&(customer::Customer::TABLE, "code")));
        assert!(unique.contains(&(customer::CustomerBillingProfile::TABLE, "customer_id")));
        assert!(unique.contains(&(worker::WorkerProfile::TABLE, "worker_id")));
        assert!(unique.contains(&(billing::BillingQueue::TABLE, "shipment_id")));
        assert!(!unique.iter().any(|(table, _)| *table == shipment::Shipment::TABLE));
    }

    #[test]
    fn worker_details_cascade_and_movements_protect() {
        let referrers = referrers(worker::Worker::TABLE);
        for table in [
            worker::WorkerProfile::TABLE,
            worker::WorkerContact::TABLE,
            worker::WorkerComment::TABLE,
            worker::WorkerTimeAway::TABLE,
        ] {
            let referrer = referrers.iter().find(|r| r.table == table).unwrap();
            assert_eq!(referrer.key.on_delete, OnDelete::Cascade);
        }
        assert!(referrers
            .iter()
            .filter(|r| r.table == movement::Movement::TABLE)
            .all(|r| r.key.on_delete == OnDelete::Protect));

        let stops = referrers_of(movement::Movement::TABLE, movement::Stop::TABLE);
        assert_eq!(stops, vec![OnDelete::Cascade]);
    }

    fn referrers_of(table: &str, holder: &str) -> Vec<OnDelete> {
        referrers(table)
            .into_iter()
            .filter(|r| r.table == holder)
            .map(|r| r.key.on_delete)
            .collect()
    }

    #[test]
    fn unreferenced_tables_have_no_referrers() {
        assert!(referrers(dispatch::DelayCode::TABLE).is_empty());
    }

    #[test]
    fn list_keys_yield_one_reference_per_id() {
        #[derive(Serialize)]
        struct Holder {
            one: Option<Uuid>,
            many: Vec<Uuid>,
        }
        const KEYS: &[ForeignKey] = &[
            ForeignKey::protect("one", "a"),
            ForeignKey::protect("many", "b").many(),
        ];
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let refs = references_from(
            &Holder {
                one: None,
                many: ids.to_vec(),
            },
            KEYS,
        );
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.table == "b"));
        assert_eq!(refs[1].id, ids[1]);
    }
}
