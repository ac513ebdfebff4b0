//! SurrealDB repository implementations.

mod control;
mod organization;
mod record;
mod token;
mod user;

use surrealdb_types::SurrealValue;

pub use control::SurrealControlRepository;
pub use organization::SurrealOrganizationRepository;
pub use record::SurrealRecordRepository;
pub use token::SurrealTokenRepository;
pub use user::SurrealUserRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}
