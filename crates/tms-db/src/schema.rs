//! Schema definitions and migration runner for SurrealDB.
//!
//! Typed tables (organization, user, token) use SCHEMAFULL mode with one
//! column per field. Generic model tables store the model body in a
//! flexible `data` object next to the organization and timestamps. UUIDs
//! are stored as strings. Enums are stored as strings with ASSERT
//! constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "accounts_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "record_tables",
        sql: RECORD_TABLES_DDL,
    },
    Migration {
        version: 3,
        name: "control_tables",
        sql: CONTROL_TABLES_DDL,
    },
    Migration {
        version: 4,
        name: "customer_tables",
        sql: CUSTOMER_TABLES_DDL,
    },
    Migration {
        version: 5,
        name: "operations_tables",
        sql: OPERATIONS_TABLES_DDL,
    },
    Migration {
        version: 6,
        name: "unique_record_fields",
        sql: UNIQUE_INDEXES_DDL,
    },
];

// -----------------------------------------------------------------------
// Schema v1 — organizations, accounts and counters
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations (global scope)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD scac_code ON TABLE organization TYPE string;
DEFINE FIELD dot_number ON TABLE organization TYPE option<int>;
DEFINE FIELD org_type ON TABLE organization TYPE string \
    ASSERT $value IN ['ASSET', 'BROKERAGE', 'BOTH'];
DEFINE FIELD timezone ON TABLE organization TYPE string;
DEFINE FIELD currency ON TABLE organization TYPE string;
DEFINE FIELD token_expiration_days ON TABLE organization TYPE int \
    DEFAULT 30;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_scac ON TABLE organization \
    COLUMNS scac_code UNIQUE;

-- =======================================================================
-- Users (organization scope, globally unique username)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE user TYPE string;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD last_name ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD job_title_id ON TABLE user TYPE option<string>;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD is_staff ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD last_login ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_organization ON TABLE user COLUMNS organization_id;

-- =======================================================================
-- API tokens (hashed bearer keys)
-- =======================================================================
DEFINE TABLE token SCHEMAFULL;
DEFINE FIELD user_id ON TABLE token TYPE string;
DEFINE FIELD organization_id ON TABLE token TYPE string;
DEFINE FIELD key_hash ON TABLE token TYPE string;
DEFINE FIELD key_prefix ON TABLE token TYPE string;
DEFINE FIELD created_at ON TABLE token TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD expires_at ON TABLE token TYPE option<datetime>;
DEFINE FIELD last_used ON TABLE token TYPE option<datetime>;
DEFINE INDEX idx_token_key_hash ON TABLE token COLUMNS key_hash UNIQUE;
DEFINE INDEX idx_token_user ON TABLE token COLUMNS user_id;

-- =======================================================================
-- Per-organization counters (PRO numbers, rate numbers)
-- =======================================================================
DEFINE TABLE sequence SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE sequence TYPE string;
DEFINE FIELD name ON TABLE sequence TYPE string;
DEFINE FIELD current ON TABLE sequence TYPE int DEFAULT 0;
";

// -----------------------------------------------------------------------
// Generic model tables
// -----------------------------------------------------------------------

macro_rules! record_tables {
    ($($ddl:ident: [$($table:literal),* $(,)?]),* $(,)?) => {
        /// Tables backing the generic organization-scoped models.
        pub const RECORD_TABLES: &[&str] = &[$($($table),*),*];

        $(const $ddl: &str = concat!($(
            "DEFINE TABLE ", $table, " SCHEMAFULL;\n",
            "DEFINE FIELD organization_id ON TABLE ", $table, " TYPE string;\n",
            "DEFINE FIELD data ON TABLE ", $table, " TYPE object FLEXIBLE DEFAULT {};\n",
            "DEFINE FIELD created_at ON TABLE ", $table, " TYPE datetime DEFAULT time::now();\n",
            "DEFINE FIELD updated_at ON TABLE ", $table, " TYPE datetime DEFAULT time::now();\n",
            "DEFINE INDEX idx_", $table, "_organization ON TABLE ", $table,
            " COLUMNS organization_id;\n",
        )*);)*
    };
}

record_tables![
    RECORD_TABLES_DDL: [
        "depot",
        "job_title",
        "general_ledger_account",
        "revenue_code",
        "charge_type",
        "accessorial_charge",
        "document_classification",
        "comment_type",
        "delay_code",
        "fleet_code",
        "rate",
        "equipment_type",
        "tractor",
        "trailer",
        "location_category",
        "location",
        "shipment_type",
        "service_type",
        "commodity",
        "shipment",
        "route",
        "worker",
    ],
    CUSTOMER_TABLES_DDL: [
        "customer",
        "customer_billing_profile",
        "customer_contact",
        "additional_charge",
        "reason_code",
    ],
    OPERATIONS_TABLES_DDL: [
        "worker_profile",
        "worker_contact",
        "worker_comment",
        "worker_time_away",
        "equipment_manufacturer",
        "equipment_maintenance_plan",
        "movement",
        "stop",
        "billing_queue",
        "billing_transfer_log",
        "billing_history",
        "billing_exception",
    ],
];

// -----------------------------------------------------------------------
// Per-organization unique values of generic models
// -----------------------------------------------------------------------

macro_rules! unique_indexes {
    ($(($table:literal, $field:literal)),* $(,)?) => {
        /// `(table, field)` pairs backed by a unique index.
        pub const UNIQUE_INDEXES: &[(&str, &str)] = &[$(($table, $field)),*];

        const UNIQUE_INDEXES_DDL: &str = concat!($(
            "DEFINE INDEX idx_", $table, "_", $field, "_unique ON TABLE ", $table,
            " FIELDS organization_id, data.", $field, " UNIQUE;\n",
        )*);
    };
}

unique_indexes![
    ("revenue_code", "code"),
    ("accessorial_charge", "code"),
    ("customer", "code"),
    ("customer_billing_profile", "customer_id"),
    ("delay_code", "code"),
    ("fleet_code", "code"),
    ("tractor", "code"),
    ("trailer", "code"),
    ("location", "code"),
    ("shipment_type", "code"),
    ("service_type", "code"),
    ("reason_code", "code"),
    ("worker_profile", "worker_id"),
    ("equipment_manufacturer", "name"),
    ("equipment_maintenance_plan", "name"),
    ("billing_queue", "shipment_id"),
];

/// Name of the index keeping `field` unique per organization in `table`.
pub(crate) fn unique_index(table: &str, field: &str) -> String {
    format!("idx_{table}_{field}_unique")
}

// -----------------------------------------------------------------------
// Control tables (one row per organization, keyed by organization id)
// -----------------------------------------------------------------------

macro_rules! control_tables {
    ($($table:literal),* $(,)?) => {
        /// Tables backing the per-organization controls.
        pub const CONTROL_TABLES: &[&str] = &[$($table),*];

        const CONTROL_TABLES_DDL: &str = concat!($(
            "DEFINE TABLE ", $table, " SCHEMAFULL;\n",
            "DEFINE FIELD organization_id ON TABLE ", $table, " TYPE string;\n",
            "DEFINE FIELD data ON TABLE ", $table, " TYPE object FLEXIBLE DEFAULT {};\n",
            "DEFINE FIELD updated_at ON TABLE ", $table, " TYPE datetime DEFAULT time::now();\n",
        )*);
    };
}

control_tables![
    "accounting_control",
    "billing_control",
    "dispatch_control",
    "route_control",
    "shipment_control",
];

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}
