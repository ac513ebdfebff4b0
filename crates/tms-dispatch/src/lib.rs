//! TMS Dispatch — route mileage, shipment, movement and billing rules.

pub mod billing;
pub mod distance;
pub mod error;
pub mod google;
pub mod mileage;
pub mod movement;
mod records;
pub mod shipment;

pub use billing::{BillSummary, BillingService, TransferSummary};
pub use error::DispatchError;
pub use google::{DistanceProvider, DistanceResult, GoogleDistanceMatrix};
pub use mileage::{MileageConfig, MileageService};
pub use movement::MovementService;
pub use shipment::ShipmentService;
