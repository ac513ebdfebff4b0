//! Route mileage between two locations.
//!
//! Lookups go from cheapest to most expensive: the in-memory cache, then a
//! stored [`Route`], then a fresh calculation using the organization's
//! [`RouteControl`].

use std::time::Duration;

use moka::future::Cache;
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::controls::RouteControl;
use tms_core::models::location::Location;
use tms_core::models::route::{DistanceMethod, DistanceUnit, Route};
use tms_core::repository::{ControlRepository, Pagination, RecordFilter, RecordRepository};
use tms_core::serializer::DOES_NOT_EXIST;
use tracing::{debug, info};
use uuid::Uuid;

use crate::distance::geodesic_distance;
use crate::google::DistanceProvider;

/// Cache sizing for calculated mileage.
#[derive(Debug, Clone)]
pub struct MileageConfig {
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
}

impl Default for MileageConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Organization, origin, destination and the unit the value is in.
type CacheKey = (Uuid, Uuid, Uuid, DistanceUnit);

/// Stored routes inspected per origin and destination pair.
const STORED_ROUTE_SCAN: u64 = 10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct MileageService<R, K, P> {
    records: R,
    controls: K,
    provider: Option<P>,
    cache: Cache<CacheKey, f64>,
}

impl<R, K, P> MileageService<R, K, P>
where
    R: RecordRepository,
    K: ControlRepository,
    P: DistanceProvider,
{
    /// Build the service; without a provider only geodesic distances
    /// are available.
    pub fn new(records: R, controls: K, provider: Option<P>, config: &MileageConfig) -> Self {
        Self {
            records,
            controls,
            provider,
            cache: Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(config.cache_ttl)
                .build(),
        }
    }

    /// Mileage from `origin_id` to `destination_id`, in the organization's
    /// configured unit.
    pub async fn get_shipment_mileage(
        &self,
        organization_id: Uuid,
        origin_id: Uuid,
        destination_id: Uuid,
    ) -> TmsResult<f64> {
        if origin_id == destination_id {
            self.location(organization_id, origin_id, "origin_location_id")
                .await?;
            return Ok(0.0);
        }

        let control: RouteControl = self.controls.get_or_init(organization_id).await?;
        let unit = control.mileage_unit;

        let key = (organization_id, origin_id, destination_id, unit);
        if let Some(mileage) = self.cache.get(&key).await {
            debug!(%origin_id, %destination_id, "Mileage cache hit");
            return Ok(mileage);
        }

        if let Some(mileage) = self
            .stored_mileage(organization_id, origin_id, destination_id, unit)
            .await?
        {
            self.cache.insert(key, mileage).await;
            return Ok(mileage);
        }

        let route = self
            .calculate(organization_id, origin_id, destination_id, &control)
            .await?;
        let mileage = route.total_mileage;
        self.cache.insert(key, mileage).await;
        Ok(mileage)
    }

    /// Drop every cached value.
    ///
    /// Called when route controls or stored routes change, since either can
    /// change the answer for a cached pair.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Mileage of a stored route for the pair, in `unit`.
    ///
    /// A route stored in `unit` is preferred; otherwise a route recorded in
    /// another unit is converted.
    async fn stored_mileage(
        &self,
        organization_id: Uuid,
        origin_id: Uuid,
        destination_id: Uuid,
        unit: DistanceUnit,
    ) -> TmsResult<Option<f64>> {
        let filter = RecordFilter::new()
            .eq("origin_location_id", origin_id.to_string())
            .eq("destination_location_id", destination_id.to_string());
        let page = self
            .records
            .list::<Route>(
                organization_id,
                filter,
                Pagination {
                    offset: 0,
                    limit: STORED_ROUTE_SCAN,
                },
            )
            .await?;

        let routes: Vec<Route> = page.items.into_iter().map(|e| e.data).collect();
        let route = routes
            .iter()
            .find(|r| r.mileage_unit == unit)
            .or_else(|| routes.first());
        Ok(route.map(|r| round2(r.mileage_unit.convert(r.total_mileage, unit))))
    }

    async fn location(&self, organization_id: Uuid, id: Uuid, field: &str) -> TmsResult<Location> {
        match self.records.get::<Location>(organization_id, id).await {
            Ok(entity) => Ok(entity.data),
            Err(TmsError::NotFound { .. }) => Err(TmsError::field(field, DOES_NOT_EXIST)),
            Err(e) => Err(e),
        }
    }

    async fn calculate(
        &self,
        organization_id: Uuid,
        origin_id: Uuid,
        destination_id: Uuid,
        control: &RouteControl,
    ) -> TmsResult<Route> {
        let origin = self
            .location(organization_id, origin_id, "origin_location_id")
            .await?;
        let destination = self
            .location(organization_id, destination_id, "destination_location_id")
            .await?;

        let (distance, duration, method) = match (&self.provider, control.distance_method) {
            (Some(provider), DistanceMethod::Google) => {
                let result = provider
                    .distance(
                        &origin.full_address(),
                        &destination.full_address(),
                        control.mileage_unit,
                    )
                    .await?;
                (result.distance, result.duration_minutes, DistanceMethod::Google)
            }
            _ => {
                let from = origin.coordinates().ok_or_else(|| {
                    TmsError::field(
                        "origin_location_id",
                        "Location has no coordinates for a geodesic distance.",
                    )
                })?;
                let to = destination.coordinates().ok_or_else(|| {
                    TmsError::field(
                        "destination_location_id",
                        "Location has no coordinates for a geodesic distance.",
                    )
                })?;
                (
                    geodesic_distance(from, to, control.mileage_unit),
                    None,
                    DistanceMethod::Geodesic,
                )
            }
        };

        let route = Route {
            origin_location_id: origin_id,
            destination_location_id: destination_id,
            total_mileage: round2(distance),
            duration: duration.map(round2),
            distance_method: method,
            mileage_unit: control.mileage_unit,
        };

        if control.generate_routes || method == DistanceMethod::Google {
            self.records.create(organization_id, route.clone()).await?;
            info!(
                %organization_id,
                %origin_id,
                %destination_id,
                mileage = route.total_mileage,
                "Stored calculated route"
            );
        }

        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mileage_rounds_to_cents() {
        assert_eq!(round2(224.938_12), 224.94);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn default_cache_settings() {
        let config = MileageConfig::default();
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
    }
}
