//! Targeting key/value resolution.
//!
//! `ValueResolver` maps key and value names to ad server ids for the length of
//! one run. The first reference to a name looks it up on the ad server and
//! creates it if absent; later references are answered from the cache. Each
//! key's existing values are fetched once, on the first value lookup for that
//! key.
//!
//! The cache is owned by the run and dropped with it.

use std::collections::HashMap;

use adserver_state::{KeyId, KeyType, MatchType, ServiceError, TargetingService, ValueId};
use serde::Serialize;
use tracing::debug;

use crate::domain::error::{Result, SetupError};
use crate::metrics::{Counter, METRICS};
use crate::obs;

/// Per-run counters of resolver traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub key_lookups: u64,
    pub keys_created: u64,
    pub value_lists_loaded: u64,
    pub values_created: u64,
    pub cache_hits: u64,
}

pub struct ValueResolver<'a> {
    service: &'a dyn TargetingService,
    keys: HashMap<String, KeyId>,
    values: HashMap<String, HashMap<String, ValueId>>,
    stats: ResolverStats,
}

fn unresolvable(name: String, source: ServiceError) -> SetupError {
    SetupError::UnresolvableName { name, source }
}

impl<'a> ValueResolver<'a> {
    pub fn new(service: &'a dyn TargetingService) -> Self {
        Self {
            service,
            keys: HashMap::new(),
            values: HashMap::new(),
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// Id of `key_name`, creating the key with `key_type` if it does not
    /// exist yet.
    pub fn get_key_id(&mut self, key_name: &str, key_type: KeyType) -> Result<KeyId> {
        if let Some(id) = self.cached_key(key_name) {
            return Ok(id);
        }

        let id = match self.lookup_key(key_name)? {
            Some(id) => id,
            None => {
                let id = self
                    .service
                    .create_key(key_name, key_type)
                    .map_err(|e| unresolvable(key_name.to_string(), e))?;
                self.stats.keys_created += 1;
                METRICS.inc(Counter::KeysCreated);
                obs::emit_key_created(key_name, id.0);
                id
            }
        };
        self.keys.insert(key_name.to_string(), id);
        Ok(id)
    }

    /// Id of `value_name` under `key_name`, creating the value if absent.
    ///
    /// The key must already exist; a missing key is an `UnresolvableName`.
    /// `match_type` only applies when the value is created.
    pub fn get_value_id(
        &mut self,
        key_name: &str,
        value_name: &str,
        match_type: MatchType,
    ) -> Result<ValueId> {
        if self.cached_key(key_name).is_none() {
            match self.lookup_key(key_name)? {
                Some(id) => {
                    self.keys.insert(key_name.to_string(), id);
                }
                None => {
                    return Err(unresolvable(
                        key_name.to_string(),
                        ServiceError::NotFound {
                            kind: "targeting key",
                            name: key_name.to_string(),
                        },
                    ))
                }
            }
        }

        if !self.values.contains_key(key_name) {
            let existing = self
                .service
                .lookup_values_by_key_name(key_name)
                .map_err(|e| unresolvable(key_name.to_string(), e))?;
            self.stats.value_lists_loaded += 1;
            debug!(key = key_name, count = existing.len(), "loaded existing values");
            let map = existing.into_iter().map(|v| (v.name, v.id)).collect();
            self.values.insert(key_name.to_string(), map);
        }

        if let Some(id) = self
            .values
            .get(key_name)
            .and_then(|vals| vals.get(value_name))
            .copied()
        {
            self.stats.cache_hits += 1;
            METRICS.inc(Counter::CacheHits);
            return Ok(id);
        }

        let id = self
            .service
            .create_value(key_name, value_name, match_type)
            .map_err(|e| unresolvable(format!("{key_name}={value_name}"), e))?;
        self.stats.values_created += 1;
        METRICS.inc(Counter::ValuesCreated);
        obs::emit_value_created(key_name, value_name, id.0);
        self.values
            .entry(key_name.to_string())
            .or_default()
            .insert(value_name.to_string(), id);
        Ok(id)
    }

    fn cached_key(&mut self, key_name: &str) -> Option<KeyId> {
        let id = self.keys.get(key_name).copied();
        if id.is_some() {
            self.stats.cache_hits += 1;
            METRICS.inc(Counter::CacheHits);
        }
        id
    }

    fn lookup_key(&mut self, key_name: &str) -> Result<Option<KeyId>> {
        self.stats.key_lookups += 1;
        self.service
            .lookup_key_id_by_name(key_name)
            .map_err(|e| unresolvable(key_name.to_string(), e))
    }
}
