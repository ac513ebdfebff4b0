//! Record repository helpers shared by the dispatch services.

use serde::Serialize;
use serde_json::Value;
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::{Entity, Model};
use tms_core::repository::{Pagination, RecordFilter, RecordRepository};
use uuid::Uuid;

/// Page size when walking every row that matches a filter.
const SCAN_PAGE: u64 = 500;

/// Every row matching `filter`, read page by page.
pub(crate) async fn list_all<R, M>(
    records: &R,
    organization_id: Uuid,
    filter: RecordFilter,
) -> TmsResult<Vec<Entity<M>>>
where
    R: RecordRepository,
    M: Model,
{
    let mut rows = Vec::new();
    loop {
        let page = records
            .list::<M>(
                organization_id,
                filter.clone(),
                Pagination {
                    offset: rows.len() as u64,
                    limit: SCAN_PAGE,
                },
            )
            .await?;
        let fetched = page.items.len() as u64;
        rows.extend(page.items);
        if fetched < SCAN_PAGE || rows.len() as u64 >= page.total {
            return Ok(rows);
        }
    }
}

/// Stored form of an enum value, as list filters compare it.
pub(crate) fn stored_value<T: Serialize>(value: T) -> TmsResult<Value> {
    serde_json::to_value(value).map_err(|e| TmsError::Internal(format!("stored value: {e}")))
}
