//! Bidline Core Library
//!
//! Builds header-bidding line items for an ad server: price ranges are split
//! into per-line-item buckets, each bucket is partitioned into price labels,
//! and every line item gets a custom targeting tree keyed on those labels.
//!
//! ## Key Components
//!
//! - `buckets`: price label partitioning
//! - `targeting`: per-run key/value id cache over `TargetingService`
//! - `criteria`: targeting tree compilation and editing
//! - `line_item`: ad server line item descriptors
//! - `settings`, `csv_buckets`: configuration input
//! - `setup`: plan and submit a whole order

pub mod buckets;
pub mod criteria;
pub mod csv_buckets;
pub mod domain;
pub mod line_item;
pub mod metrics;
pub mod obs;
pub mod settings;
pub mod setup;
pub mod targeting;
pub mod telemetry;

pub use buckets::partition;

pub use criteria::compiler::compile_options;
pub use criteria::edit::{append_criteria, managed_children, remove_key, replace_key};
pub use criteria::{
    BidderSelection, CriteriaNode, CustomTargeting, CustomValues, LogicalOperator, Operator,
    TargetingCompiler, TargetingKeyNames, TargetingOptions,
};

pub use csv_buckets::{expand_ranges, load_price_csv, read_price_csv};

pub use domain::digest::{canonical_json, compute_digest, plan_digest};
pub use domain::{
    calculated_rate, to_micro_amount, AdvertiserType, CreativeType, Granularity, LineItemType,
    PriceBucket, PriceRange, RateRule, Result, RoadblockType, SetupError, WHOLE_RANGE_SENTINEL,
};

pub use line_item::{line_item_name, unique_prefix, LineItemContext, LineItemDescriptor};

pub use settings::{Settings, Size, ValidatedSettings};

pub use setup::{
    plan_line_items, run_setup, submit_plan, LineItemPlan, SetupReport, BATCH_SIZE,
    LINE_ITEMS_LIMIT,
};

pub use targeting::{ResolverStats, ValueResolver};
