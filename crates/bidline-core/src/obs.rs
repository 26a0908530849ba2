//! Structured lifecycle events for a setup run.
//!
//! - `PlanSpan` RAII guard scoping all logs of one run to its order
//! - `emit_*` functions for plan start/finish/abort, targeting creation and
//!   compiled line items
//!
//! Filter with `RUST_LOG` (e.g. `RUST_LOG=bidline_core=debug`).

use tracing::{info, warn};

/// RAII guard that enters an order-scoped span for the duration of a run.
///
/// ```ignore
/// let _span = PlanSpan::enter("Prebid Display 1");
/// // every log line now carries order = "Prebid Display 1"
/// ```
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    pub fn enter(order_name: &str) -> Self {
        let span = tracing::info_span!("bidline.plan", order = %order_name);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: plan started for a number of price buckets.
pub fn emit_plan_started(order_name: &str, creative_type: &str, buckets: usize) {
    info!(
        event = "plan.started",
        order = %order_name,
        creative_type = %creative_type,
        buckets = buckets,
    );
}

/// Emit event: a targeting key was created on the ad server.
pub fn emit_key_created(key_name: &str, key_id: i64) {
    info!(event = "targeting.key_created", key = %key_name, key_id = key_id);
}

/// Emit event: a targeting value was created on the ad server.
pub fn emit_value_created(key_name: &str, value_name: &str, value_id: i64) {
    info!(
        event = "targeting.value_created",
        key = %key_name,
        value = %value_name,
        value_id = value_id,
    );
}

/// Emit event: one line item descriptor was assembled.
pub fn emit_line_item_compiled(name: &str, micro_amount: i64, price_labels: usize) {
    info!(
        event = "line_item.compiled",
        name = %name,
        micro_amount = micro_amount,
        price_labels = price_labels,
    );
}

/// Emit event: every batch was accepted and the order is fully set up.
pub fn emit_plan_finished(order_id: i64, line_items: usize, digest: &str) {
    info!(
        event = "plan.finished",
        order_id = order_id,
        line_items = line_items,
        digest = %digest,
    );
}

/// Emit event: run aborted on its first error (warning level).
pub fn emit_plan_aborted(order_name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "plan.aborted", order = %order_name, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_span_enter() {
        let _span = PlanSpan::enter("order-under-test");
        emit_plan_started("order-under-test", "WEB", 3);
        emit_line_item_compiled("PM_1.50", 1_500_000, 1);
        emit_plan_finished(7, 1, "abc123");
        emit_plan_aborted("order-under-test", &"boom");
    }
}
