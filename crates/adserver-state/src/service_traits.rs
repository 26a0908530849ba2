//! Collaborator trait definitions for the ad server
//!
//! These traits describe exactly what bidline needs from a remote ad server:
//! - `TargetingService`: custom targeting key/value lookup and creation
//! - `InventoryService`: placement, ad unit and technology id lookup
//! - `LineItemService`: line item creation under an order
//!
//! All traits are synchronous request/response. Transport, authentication and
//! retries belong to the implementations. In-memory fakes are provided via the
//! `fakes` module.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Result type for ad server operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

// ---------------------------------------------------------------------------
// Opaque identifiers
// ---------------------------------------------------------------------------

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(
    /// Custom targeting key id assigned by the ad server.
    KeyId
);
opaque_id!(
    /// Custom targeting value id assigned by the ad server.
    ValueId
);
opaque_id!(
    /// Line item id assigned on creation.
    LineItemId
);
opaque_id!(
    /// Placement id.
    PlacementId
);
opaque_id!(
    /// Ad unit id.
    AdUnitId
);
opaque_id!(
    /// Device category or device capability id.
    TechnologyId
);

// ---------------------------------------------------------------------------
// TargetingService
// ---------------------------------------------------------------------------

/// How the ad server treats a targeting key's value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    /// Values are enumerated up front and shown in the ad server UI.
    Predefined,
    /// Values are arbitrary strings sent with the ad request.
    Freeform,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Predefined => "PREDEFINED",
            KeyType::Freeform => "FREEFORM",
        }
    }
}

/// How a targeting value is matched against the request value at serve time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,
    /// The value is a prefix of the request value (`1.5` matches `1.57`).
    Prefix,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "EXACT",
            MatchType::Prefix => "PREFIX",
        }
    }
}

/// One existing value under a targeting key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingValueRecord {
    pub name: String,
    pub id: ValueId,
}

/// Custom targeting key/value collaborator.
pub trait TargetingService {
    /// Look up a key id by its name. `Ok(None)` when the key does not exist.
    fn lookup_key_id_by_name(&self, name: &str) -> ServiceResult<Option<KeyId>>;

    /// Create a key and return its id.
    fn create_key(&self, name: &str, key_type: KeyType) -> ServiceResult<KeyId>;

    /// List every value that exists under the named key.
    ///
    /// Returns `NotFound` if the key itself does not exist.
    fn lookup_values_by_key_name(&self, key_name: &str)
        -> ServiceResult<Vec<TargetingValueRecord>>;

    /// Create a value under the named key and return its id.
    fn create_value(
        &self,
        key_name: &str,
        value_name: &str,
        match_type: MatchType,
    ) -> ServiceResult<ValueId>;
}

// ---------------------------------------------------------------------------
// InventoryService
// ---------------------------------------------------------------------------

/// Inventory and technology lookups used when assembling line items.
pub trait InventoryService {
    /// Resolve placement names to ids, preserving input order.
    ///
    /// Returns `NotFound` for the first name that does not exist.
    fn placement_ids_by_name(&self, names: &[String]) -> ServiceResult<Vec<PlacementId>>;

    /// Id of the network's root ad unit (run-of-network targeting).
    fn root_ad_unit_id(&self) -> ServiceResult<AdUnitId>;

    /// Resolve device category names (`Desktop`, `Tablet`, ...) to ids.
    fn device_category_ids(&self, names: &[String]) -> ServiceResult<Vec<TechnologyId>>;

    /// Resolve device capability names (`MRAID v1`, ...) to ids.
    fn device_capability_ids(&self, names: &[String]) -> ServiceResult<Vec<TechnologyId>>;
}

// ---------------------------------------------------------------------------
// LineItemService
// ---------------------------------------------------------------------------

/// Line item creation collaborator.
///
/// Line items are passed in the ad server's JSON shape so this crate does not
/// depend on the descriptor types that produce them.
pub trait LineItemService {
    /// Create a batch of line items under `order_id`.
    ///
    /// Returns one id per input, in input order.
    fn create_line_items(
        &self,
        order_id: i64,
        line_items: &[serde_json::Value],
    ) -> ServiceResult<Vec<LineItemId>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_id_serializes_transparently() {
        let json = serde_json::to_string(&KeyId(42)).unwrap();
        assert_eq!(json, "42");
        let back: ValueId = serde_json::from_str("7").unwrap();
        assert_eq!(back, ValueId(7));
    }

    #[test]
    fn test_key_and_match_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&KeyType::Predefined).unwrap(),
            "\"PREDEFINED\""
        );
        assert_eq!(MatchType::Prefix.as_str(), "PREFIX");
        assert_eq!(KeyType::Freeform.as_str(), "FREEFORM");
    }
}
