//! Setup run orchestration.
//!
//! A run has two phases. [`plan_line_items`] resolves inventory and
//! targeting, compiles one criteria tree per price bucket and assembles every
//! descriptor. Only a complete plan reaches [`submit_plan`], which hands the
//! descriptors to the ad server in batches. A failure while planning
//! therefore creates no line items.

use adserver_state::{InventoryService, LineItemId, LineItemService, ServiceError, TargetingService};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::criteria::TargetingCompiler;
use crate::domain::digest::plan_digest;
use crate::domain::error::{Result, SetupError};
use crate::domain::price::PriceBucket;
use crate::line_item::{
    InventoryTargeting, LineItemContext, LineItemDescriptor, TechnologyTargeting,
};
use crate::metrics::{Counter, METRICS};
use crate::obs::{self, PlanSpan};
use crate::settings::ValidatedSettings;
use crate::targeting::{ResolverStats, ValueResolver};

/// Most line items the ad server accepts under one order.
pub const LINE_ITEMS_LIMIT: usize = 450;

/// Line items sent per creation request.
pub const BATCH_SIZE: usize = 225;

/// Every descriptor of one order, ready to submit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemPlan {
    pub order_name: String,
    pub order_id: i64,
    pub descriptors: Vec<LineItemDescriptor>,
    pub resolver_stats: ResolverStats,
    pub digest: String,
}

/// Outcome of a submitted plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupReport {
    pub order_name: String,
    pub order_id: i64,
    pub line_item_ids: Vec<LineItemId>,
    pub plan_digest: String,
    pub resolver_stats: ResolverStats,
    pub created_at: DateTime<Utc>,
}

fn resolve_inventory(
    settings: &ValidatedSettings,
    inventory: &dyn InventoryService,
) -> Result<InventoryTargeting> {
    if settings.placements.is_empty() {
        let root = inventory.root_ad_unit_id()?;
        debug!(root_ad_unit = %root, "targeting run of network");
        Ok(InventoryTargeting::run_of_network(root))
    } else {
        let ids = inventory.placement_ids_by_name(&settings.placements)?;
        Ok(InventoryTargeting::placements(ids))
    }
}

fn resolve_technology(
    settings: &ValidatedSettings,
    inventory: &dyn InventoryService,
) -> Result<Option<TechnologyTargeting>> {
    let categories = match &settings.device_categories {
        Some(names) if !names.is_empty() => inventory.device_category_ids(names)?,
        _ => Vec::new(),
    };
    let capabilities = match &settings.device_capabilities {
        Some(names) if !names.is_empty() => inventory.device_capability_ids(names)?,
        _ => Vec::new(),
    };
    Ok(TechnologyTargeting::from_ids(&categories, &capabilities))
}

/// Compile every bucket into a line item descriptor.
///
/// Fails fast: the first error aborts the run and no plan is returned.
pub fn plan_line_items(
    settings: &ValidatedSettings,
    buckets: &[PriceBucket],
    order_id: i64,
    targeting: &dyn TargetingService,
    inventory: &dyn InventoryService,
) -> Result<LineItemPlan> {
    let _span = PlanSpan::enter(&settings.order_name);
    let result = build_plan(settings, buckets, order_id, targeting, inventory);
    if let Err(err) = &result {
        obs::emit_plan_aborted(&settings.order_name, err);
    }
    result
}

fn build_plan(
    settings: &ValidatedSettings,
    buckets: &[PriceBucket],
    order_id: i64,
    targeting: &dyn TargetingService,
    inventory: &dyn InventoryService,
) -> Result<LineItemPlan> {
    if buckets.is_empty() {
        return Err(SetupError::config("no price buckets to set up"));
    }
    if buckets.len() > LINE_ITEMS_LIMIT {
        return Err(SetupError::config(format!(
            "{} line items exceed the limit of {LINE_ITEMS_LIMIT} per order",
            buckets.len()
        )));
    }
    obs::emit_plan_started(
        &settings.order_name,
        settings.creative_type.as_str(),
        buckets.len(),
    );

    let context = LineItemContext::new(
        settings,
        order_id,
        resolve_inventory(settings, inventory)?,
        resolve_technology(settings, inventory)?,
    );

    let mut resolver = ValueResolver::new(targeting);
    let mut descriptors = Vec::with_capacity(buckets.len());
    {
        let mut compiler = TargetingCompiler::new(&mut resolver, settings.targeting_keys.clone())?;
        compiler.set_platform(settings.creative_type)?;
        compiler.set_bidder_value(settings.bidder.as_ref())?;
        compiler.set_custom_targeting(&settings.custom_targeting)?;

        for bucket in buckets {
            let labels = bucket.labels()?;
            let label_count = labels.len();
            compiler.set_price_value(labels);
            let descriptor = context.assemble(bucket, compiler.compile()?);
            obs::emit_line_item_compiled(
                &descriptor.name,
                descriptor.cost_per_unit.micro_amount,
                label_count,
            );
            METRICS.inc(Counter::LineItemsCompiled);
            descriptors.push(descriptor);
        }
    }

    let digest = plan_digest(&descriptors)?;
    Ok(LineItemPlan {
        order_name: settings.order_name.clone(),
        order_id,
        descriptors,
        resolver_stats: resolver.stats(),
        digest,
    })
}

/// Create the planned line items in batches of [`BATCH_SIZE`].
pub fn submit_plan(plan: &LineItemPlan, line_items: &dyn LineItemService) -> Result<SetupReport> {
    let _span = PlanSpan::enter(&plan.order_name);
    if plan.descriptors.len() > LINE_ITEMS_LIMIT {
        return Err(SetupError::config(format!(
            "{} line items exceed the limit of {LINE_ITEMS_LIMIT} per order",
            plan.descriptors.len()
        )));
    }

    let bodies = plan
        .descriptors
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut ids = Vec::with_capacity(bodies.len());
    for (batch_no, batch) in bodies.chunks(BATCH_SIZE).enumerate() {
        let created = line_items.create_line_items(plan.order_id, batch)?;
        if created.len() != batch.len() {
            return Err(SetupError::Service(ServiceError::Rejected(format!(
                "batch {batch_no}: sent {} line items, ad server returned {} ids",
                batch.len(),
                created.len()
            ))));
        }
        info!(batch = batch_no, line_items = created.len(), "created line item batch");
        ids.extend(created);
    }

    obs::emit_plan_finished(plan.order_id, ids.len(), &plan.digest);
    METRICS.flush();
    Ok(SetupReport {
        order_name: plan.order_name.clone(),
        order_id: plan.order_id,
        line_item_ids: ids,
        plan_digest: plan.digest.clone(),
        resolver_stats: plan.resolver_stats,
        created_at: Utc::now(),
    })
}

/// Plan and submit in one call.
pub fn run_setup(
    settings: &ValidatedSettings,
    buckets: &[PriceBucket],
    order_id: i64,
    targeting: &dyn TargetingService,
    inventory: &dyn InventoryService,
    line_items: &dyn LineItemService,
) -> Result<SetupReport> {
    let plan = plan_line_items(settings, buckets, order_id, targeting, inventory)?;
    submit_plan(&plan, line_items)
}
