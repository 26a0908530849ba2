//! Price range CSV loading.
//!
//! Six columns, header row first:
//!
//! ```text
//! order_name,advertiser_name,start_range,end_range,granularity,rate_rule_id
//! Prebid,PubMatic,0.00,5.00,0.10,1
//! Prebid,PubMatic,5.00,20.00,-1,2
//! ```
//!
//! The order and advertiser columns are ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::error::{Result, SetupError};
use crate::domain::price::{Granularity, PriceBucket, PriceRange, RateRule};

#[derive(Debug, Deserialize)]
struct PriceRow {
    _order_name: String,
    _advertiser_name: String,
    start: f64,
    end: f64,
    granularity: f64,
    rate_rule_id: i64,
}

impl PriceRow {
    fn into_range(self) -> Result<PriceRange> {
        PriceRange::new(
            self.start,
            self.end,
            Granularity::from_raw(self.granularity),
            RateRule::from_id(self.rate_rule_id)?,
        )
    }
}

/// Parse price ranges from CSV text.
pub fn read_price_csv<R: Read>(reader: R) -> Result<Vec<PriceRange>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut ranges = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        let row: PriceRow = record.deserialize(None)?;
        let range = row.into_range().map_err(|err| match err {
            SetupError::InvalidRange(msg) => {
                SetupError::range(format!("row {}: {msg}", index + 2))
            }
            other => other,
        })?;
        debug!(
            start = range.start,
            end = range.end,
            granularity = %range.granularity,
            "loaded price range"
        );
        ranges.push(range);
    }
    Ok(ranges)
}

/// Load price ranges from a CSV file.
pub fn load_price_csv(path: &Path) -> Result<Vec<PriceRange>> {
    let file = File::open(path)?;
    let ranges = read_price_csv(file)?;
    info!(path = %path.display(), ranges = ranges.len(), "loaded price csv");
    Ok(ranges)
}

/// Expand every range into line item buckets, in file order.
pub fn expand_ranges(ranges: &[PriceRange], exchange_rate: f64) -> Result<Vec<PriceBucket>> {
    let mut buckets = Vec::new();
    for range in ranges {
        buckets.extend(range.expand(exchange_rate)?);
    }
    Ok(buckets)
}
