//! Domain models for bidline.
//!
//! - `price`: price ranges, per-line-item buckets, rate arithmetic
//! - `creative`: creative surfaces and line item enums
//! - `digest`: canonical plan digests
//! - `error`: the `SetupError` taxonomy

pub mod creative;
pub mod digest;
pub mod error;
pub mod price;

pub use creative::{AdvertiserType, CreativeType, LineItemType, RoadblockType};
pub use error::{Result, SetupError};
pub use price::{
    calculated_rate, to_micro_amount, Granularity, PriceBucket, PriceRange, RateRule,
    WHOLE_RANGE_SENTINEL,
};
