//! In-memory fakes for the ad server collaborators
//!
//! Provides `MemoryTargetingService`, `MemoryInventoryService`, and
//! `MemoryLineItemService`. They satisfy the trait contracts without any
//! network access, count every call so tests can assert on traffic, and
//! back the CLI's dry-run mode.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::ServiceError;
use crate::service_traits::*;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemoryTargetingService
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct KeyState {
    id: KeyId,
    key_type: KeyType,
    values: Vec<(String, ValueId, MatchType)>,
}

#[derive(Debug, Default)]
struct TargetingState {
    next_id: i64,
    keys: BTreeMap<String, KeyState>,
    failing_keys: HashSet<String>,
    key_lookups: usize,
    key_creations: usize,
    value_lookups: usize,
    value_creations: usize,
}

impl TargetingState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_failure(&self, key_name: &str) -> ServiceResult<()> {
        if self.failing_keys.contains(key_name) {
            return Err(ServiceError::Unavailable(format!(
                "injected failure for key '{key_name}'"
            )));
        }
        Ok(())
    }
}

/// In-memory custom targeting store.
///
/// Ids are allocated from a single counter starting at 1001.
#[derive(Debug)]
pub struct MemoryTargetingService {
    state: Mutex<TargetingState>,
}

impl Default for MemoryTargetingService {
    fn default() -> Self {
        Self {
            state: Mutex::new(TargetingState {
                next_id: 1000,
                ..TargetingState::default()
            }),
        }
    }
}

impl MemoryTargetingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a key, as if it already existed on the ad server.
    pub fn with_key(self, name: &str, key_type: KeyType) -> Self {
        {
            let mut state = lock(&self.state);
            let id = KeyId(state.allocate());
            state.keys.entry(name.to_string()).or_insert(KeyState {
                id,
                key_type,
                values: Vec::new(),
            });
        }
        self
    }

    /// Pre-create a value under an existing key.
    pub fn with_value(self, key_name: &str, value_name: &str) -> Self {
        {
            let mut state = lock(&self.state);
            let id = ValueId(state.allocate());
            if let Some(key) = state.keys.get_mut(key_name) {
                key.values
                    .push((value_name.to_string(), id, MatchType::Exact));
            }
        }
        self
    }

    /// Make every call that touches `key_name` fail with `Unavailable`.
    pub fn fail_on_key(&self, key_name: &str) {
        lock(&self.state).failing_keys.insert(key_name.to_string());
    }

    pub fn key_lookups(&self) -> usize {
        lock(&self.state).key_lookups
    }

    pub fn key_creations(&self) -> usize {
        lock(&self.state).key_creations
    }

    pub fn value_lookups(&self) -> usize {
        lock(&self.state).value_lookups
    }

    pub fn value_creations(&self) -> usize {
        lock(&self.state).value_creations
    }

    /// Key type recorded for `name`, if the key exists.
    pub fn key_type(&self, name: &str) -> Option<KeyType> {
        lock(&self.state).keys.get(name).map(|k| k.key_type)
    }

    /// Match type recorded for a value, if it exists.
    pub fn value_match_type(&self, key_name: &str, value_name: &str) -> Option<MatchType> {
        let state = lock(&self.state);
        state.keys.get(key_name).and_then(|k| {
            k.values
                .iter()
                .find(|(name, _, _)| name == value_name)
                .map(|(_, _, m)| *m)
        })
    }

    /// Value names under a key, in creation order.
    pub fn value_names(&self, key_name: &str) -> Vec<String> {
        let state = lock(&self.state);
        state
            .keys
            .get(key_name)
            .map(|k| k.values.iter().map(|(name, _, _)| name.clone()).collect())
            .unwrap_or_default()
    }
}

impl TargetingService for MemoryTargetingService {
    fn lookup_key_id_by_name(&self, name: &str) -> ServiceResult<Option<KeyId>> {
        let mut state = lock(&self.state);
        state.check_failure(name)?;
        state.key_lookups += 1;
        Ok(state.keys.get(name).map(|k| k.id))
    }

    fn create_key(&self, name: &str, key_type: KeyType) -> ServiceResult<KeyId> {
        let mut state = lock(&self.state);
        state.check_failure(name)?;
        if state.keys.contains_key(name) {
            return Err(ServiceError::AlreadyExists {
                kind: "targeting key",
                name: name.to_string(),
            });
        }
        let id = KeyId(state.allocate());
        state.keys.insert(
            name.to_string(),
            KeyState {
                id,
                key_type,
                values: Vec::new(),
            },
        );
        state.key_creations += 1;
        debug!(key = name, id = id.0, "fake: created targeting key");
        Ok(id)
    }

    fn lookup_values_by_key_name(
        &self,
        key_name: &str,
    ) -> ServiceResult<Vec<TargetingValueRecord>> {
        let mut state = lock(&self.state);
        state.check_failure(key_name)?;
        state.value_lookups += 1;
        let key = state
            .keys
            .get(key_name)
            .ok_or_else(|| ServiceError::NotFound {
                kind: "targeting key",
                name: key_name.to_string(),
            })?;
        Ok(key
            .values
            .iter()
            .map(|(name, id, _)| TargetingValueRecord {
                name: name.clone(),
                id: *id,
            })
            .collect())
    }

    fn create_value(
        &self,
        key_name: &str,
        value_name: &str,
        match_type: MatchType,
    ) -> ServiceResult<ValueId> {
        let mut state = lock(&self.state);
        state.check_failure(key_name)?;
        let id = ValueId(state.allocate());
        let key = state
            .keys
            .get_mut(key_name)
            .ok_or_else(|| ServiceError::NotFound {
                kind: "targeting key",
                name: key_name.to_string(),
            })?;
        if key.values.iter().any(|(name, _, _)| name == value_name) {
            return Err(ServiceError::AlreadyExists {
                kind: "targeting value",
                name: format!("{key_name}={value_name}"),
            });
        }
        key.values.push((value_name.to_string(), id, match_type));
        state.value_creations += 1;
        debug!(key = key_name, value = value_name, id = id.0, "fake: created targeting value");
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// MemoryInventoryService
// ---------------------------------------------------------------------------

const DEFAULT_DEVICE_CATEGORIES: &[(&str, i64)] = &[
    ("Connected TV", 30004),
    ("Desktop", 30000),
    ("Feature Phone", 30003),
    ("Set Top Box", 30005),
    ("Smartphone", 30001),
    ("Tablet", 30002),
];

const DEFAULT_DEVICE_CAPABILITIES: &[(&str, i64)] = &[
    ("MRAID v1", 5005),
    ("MRAID v2", 5006),
    ("Mobile Apps", 5000),
    ("Phone calls", 5001),
];

/// In-memory inventory with a fixed root ad unit and the standard device
/// category and capability tables.
#[derive(Debug)]
pub struct MemoryInventoryService {
    root_ad_unit: AdUnitId,
    placements: Mutex<HashMap<String, PlacementId>>,
    device_categories: HashMap<String, TechnologyId>,
    device_capabilities: HashMap<String, TechnologyId>,
}

fn technology_table(rows: &[(&str, i64)]) -> HashMap<String, TechnologyId> {
    rows.iter()
        .map(|(name, id)| (name.to_string(), TechnologyId(*id)))
        .collect()
}

impl Default for MemoryInventoryService {
    fn default() -> Self {
        Self {
            root_ad_unit: AdUnitId(21_000_000),
            placements: Mutex::new(HashMap::new()),
            device_categories: technology_table(DEFAULT_DEVICE_CATEGORIES),
            device_capabilities: technology_table(DEFAULT_DEVICE_CAPABILITIES),
        }
    }
}

impl MemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a placement name with a fixed id.
    pub fn with_placement(self, name: &str, id: i64) -> Self {
        lock(&self.placements).insert(name.to_string(), PlacementId(id));
        self
    }

    /// Register every name in `names`, allocating ids from 9001 upward.
    pub fn with_placements<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut placements = lock(&self.placements);
            for name in names {
                let next = PlacementId(9001 + placements.len() as i64);
                placements.entry(name.as_ref().to_string()).or_insert(next);
            }
        }
        self
    }

    fn resolve_technology(
        table: &HashMap<String, TechnologyId>,
        kind: &'static str,
        names: &[String],
    ) -> ServiceResult<Vec<TechnologyId>> {
        names
            .iter()
            .map(|name| {
                table.get(name).copied().ok_or_else(|| ServiceError::NotFound {
                    kind,
                    name: name.clone(),
                })
            })
            .collect()
    }
}

impl InventoryService for MemoryInventoryService {
    fn placement_ids_by_name(&self, names: &[String]) -> ServiceResult<Vec<PlacementId>> {
        let placements = lock(&self.placements);
        names
            .iter()
            .map(|name| {
                placements
                    .get(name)
                    .copied()
                    .ok_or_else(|| ServiceError::NotFound {
                        kind: "placement",
                        name: name.clone(),
                    })
            })
            .collect()
    }

    fn root_ad_unit_id(&self) -> ServiceResult<AdUnitId> {
        Ok(self.root_ad_unit)
    }

    fn device_category_ids(&self, names: &[String]) -> ServiceResult<Vec<TechnologyId>> {
        Self::resolve_technology(&self.device_categories, "device category", names)
    }

    fn device_capability_ids(&self, names: &[String]) -> ServiceResult<Vec<TechnologyId>> {
        Self::resolve_technology(&self.device_capabilities, "device capability", names)
    }
}

// ---------------------------------------------------------------------------
// MemoryLineItemService
// ---------------------------------------------------------------------------

/// A line item accepted by `MemoryLineItemService`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLineItem {
    pub id: LineItemId,
    pub order_id: i64,
    pub body: serde_json::Value,
}

#[derive(Debug, Default)]
struct LineItemState {
    next_id: i64,
    stored: Vec<StoredLineItem>,
    batches: usize,
    reject_with: Option<String>,
}

/// In-memory line item sink.
#[derive(Debug, Default)]
pub struct MemoryLineItemService {
    state: Mutex<LineItemState>,
}

impl MemoryLineItemService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent batch with the given message.
    pub fn reject_all(&self, message: &str) {
        lock(&self.state).reject_with = Some(message.to_string());
    }

    /// Number of `create_line_items` calls that were accepted.
    pub fn batches(&self) -> usize {
        lock(&self.state).batches
    }

    pub fn stored(&self) -> Vec<StoredLineItem> {
        lock(&self.state).stored.clone()
    }
}

impl LineItemService for MemoryLineItemService {
    fn create_line_items(
        &self,
        order_id: i64,
        line_items: &[serde_json::Value],
    ) -> ServiceResult<Vec<LineItemId>> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.reject_with {
            return Err(ServiceError::Rejected(message.clone()));
        }
        if line_items
            .iter()
            .any(|body| body.get("name").and_then(|n| n.as_str()).is_none())
        {
            return Err(ServiceError::Rejected(
                "line item is missing a name".to_string(),
            ));
        }
        let mut ids = Vec::with_capacity(line_items.len());
        for body in line_items {
            state.next_id += 1;
            let id = LineItemId(5_000_000 + state.next_id);
            state.stored.push(StoredLineItem {
                id,
                order_id,
                body: body.clone(),
            });
            ids.push(id);
        }
        state.batches += 1;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_key_and_value_are_visible() {
        let svc = MemoryTargetingService::new()
            .with_key("pwtbst", KeyType::Predefined)
            .with_value("pwtbst", "1");
        let key = svc.lookup_key_id_by_name("pwtbst").unwrap();
        assert!(key.is_some());
        let values = svc.lookup_values_by_key_name("pwtbst").unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].name, "1");
        assert_eq!(svc.key_creations(), 0);
    }

    #[test]
    fn test_with_value_on_missing_key_is_ignored() {
        let svc = MemoryTargetingService::new().with_value("absent", "x");
        assert!(svc.value_names("absent").is_empty());
    }

    #[test]
    fn test_injected_failure_surfaces_unavailable() {
        let svc = MemoryTargetingService::new();
        svc.fail_on_key("region");
        let err = svc.lookup_key_id_by_name("region").unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[test]
    fn test_placements_allocate_distinct_ids() {
        let inv = MemoryInventoryService::new().with_placements(["top", "side"]);
        let ids = inv
            .placement_ids_by_name(&["side".to_string(), "top".to_string()])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_line_item_without_name_is_rejected() {
        let svc = MemoryLineItemService::new();
        let err = svc
            .create_line_items(1, &[serde_json::json!({"orderId": 1})])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
        assert_eq!(svc.batches(), 0);
    }
}
