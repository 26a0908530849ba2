//! Adserver-State: ad server collaborator seams for bidline
//!
//! This crate defines the small surface bidline needs from a remote ad
//! server and provides in-memory implementations of it.
//!
//! ## Layer 0 - External collaborators
//!
//! Focus: request/response shapes and opaque identifiers. No transport.
//!
//! ## Key Components
//!
//! - `TargetingService`: custom targeting key/value lookup and creation
//! - `InventoryService`: placements, root ad unit, technology ids
//! - `LineItemService`: line item creation under an order
//! - `fakes`: in-memory versions of all three

mod error;
pub mod fakes;
pub mod service_traits;

pub use error::ServiceError;
pub use service_traits::{
    AdUnitId, InventoryService, KeyId, KeyType, LineItemId, LineItemService, MatchType,
    PlacementId, ServiceResult, TargetingService, TargetingValueRecord, TechnologyId, ValueId,
};
