//! TMS Core — domain models, repository traits and the serializer layer
//! shared by every other crate in the workspace.
//!
//! Nearly every record is scoped to an [`models::organization::Organization`];
//! repositories take the organization id on every call and the serializer
//! injects it on every write, so tenant isolation never depends on request
//! payloads.

pub mod error;
pub mod models;
pub mod repository;
pub mod serializer;
pub mod validation;
