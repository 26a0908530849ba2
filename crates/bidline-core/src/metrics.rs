//! Process-wide counters for targeting and line item work.
//!
//! Counters are bumped at the call site; [`Metrics::flush`] emits them as one
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Something counted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Targeting keys created on the ad server.
    KeysCreated,
    /// Targeting values created on the ad server.
    ValuesCreated,
    /// Key or value ids answered from the per-run cache.
    CacheHits,
    /// Line item descriptors assembled.
    LineItemsCompiled,
}

impl Counter {
    const ALL: [Counter; 4] = [
        Counter::KeysCreated,
        Counter::ValuesCreated,
        Counter::CacheHits,
        Counter::LineItemsCompiled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Counter::KeysCreated => "keys_created",
            Counter::ValuesCreated => "values_created",
            Counter::CacheHits => "cache_hits",
            Counter::LineItemsCompiled => "line_items_compiled",
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub keys_created: u64,
    pub values_created: u64,
    pub cache_hits: u64,
    pub line_items_compiled: u64,
}

pub struct Metrics {
    counts: [AtomicU64; Counter::ALL.len()],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            counts: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
        }
    }

    /// Add one to `counter`. Cache hits are too frequent to trace.
    pub fn inc(&self, counter: Counter) {
        self.counts[counter as usize].fetch_add(1, Ordering::Relaxed);
        if counter != Counter::CacheHits {
            tracing::trace!(metric = counter.as_str(), "counter incremented");
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            keys_created: self.get(Counter::KeysCreated),
            values_created: self.get(Counter::ValuesCreated),
            cache_hits: self.get(Counter::CacheHits),
            line_items_compiled: self.get(Counter::LineItemsCompiled),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            keys_created = s.keys_created,
            values_created = s.values_created,
            cache_hits = s.cache_hits,
            line_items_compiled = s.line_items_compiled,
        );
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in Counter::ALL {
            self.counts[counter as usize].store(0, Ordering::Relaxed);
        }
    }
}
