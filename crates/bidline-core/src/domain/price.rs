//! Price ranges, per-line-item price buckets and rate arithmetic.
//!
//! A `PriceRange` is one row of the price configuration. `expand` splits it
//! into `PriceBucket`s, one per line item, each carrying its own rate.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::{Result, SetupError};

/// Raw granularity value that means "one bucket covering the whole range".
pub const WHOLE_RANGE_SENTINEL: f64 = -1.0;

/// Smallest granularity the price key can express (one cent).
pub const MIN_GRANULARITY: f64 = 0.01;

/// Round half-to-even at `places` decimal digits.
pub(crate) fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round_ties_even() / scale
}

pub(crate) fn round2(x: f64) -> f64 {
    round_to(x, 2)
}

/// Step between consecutive price buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Step(f64),
    /// A single bucket spanning `[start, end)`.
    WholeRange,
}

impl Granularity {
    /// Interpret a raw configured value; `-1` is the whole-range sentinel.
    pub fn from_raw(raw: f64) -> Self {
        if raw == WHOLE_RANGE_SENTINEL {
            Granularity::WholeRange
        } else {
            Granularity::Step(raw)
        }
    }

    /// Granularity used for partitioning. A whole-range bucket is
    /// partitioned in unit steps.
    pub fn effective(&self) -> f64 {
        match self {
            Granularity::Step(g) => *g,
            Granularity::WholeRange => 1.0,
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Step(g) => write!(f, "{g}"),
            Granularity::WholeRange => write!(f, "whole-range"),
        }
    }
}

/// Which point of a bucket sets the line item rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateRule {
    Midpoint,
    Start,
}

impl RateRule {
    /// Map the configured rule id: `1` is midpoint, `2` is start.
    pub fn from_id(id: i64) -> Result<Self> {
        match id {
            1 => Ok(RateRule::Midpoint),
            2 => Ok(RateRule::Start),
            other => Err(SetupError::config(format!(
                "unknown rate rule id {other} (expected 1 for midpoint or 2 for start)"
            ))),
        }
    }
}

/// Check `start`, `end` and `granularity` describe a range that can be
/// partitioned.
pub fn validate_range(start: f64, end: f64, granularity: Granularity) -> Result<()> {
    if !start.is_finite() || !end.is_finite() {
        return Err(SetupError::range(format!(
            "bounds must be finite numbers (start {start}, end {end})"
        )));
    }
    if start < 0.0 {
        return Err(SetupError::range(format!("start {start} is negative")));
    }
    if end <= start {
        return Err(SetupError::range(format!(
            "end {end} must be greater than start {start}"
        )));
    }
    if let Granularity::Step(g) = granularity {
        if !g.is_finite() || round2(g) < MIN_GRANULARITY {
            return Err(SetupError::range(format!(
                "granularity {g} must be at least {MIN_GRANULARITY} or {WHOLE_RANGE_SENTINEL}"
            )));
        }
    }
    Ok(())
}

/// One configured price range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub start: f64,
    pub end: f64,
    pub granularity: Granularity,
    pub rate_rule: RateRule,
}

impl PriceRange {
    pub fn new(
        start: f64,
        end: f64,
        granularity: Granularity,
        rate_rule: RateRule,
    ) -> Result<Self> {
        validate_range(start, end, granularity)?;
        Ok(Self {
            start,
            end,
            granularity,
            rate_rule,
        })
    }

    /// Split the range into one bucket per line item.
    ///
    /// Bucket edges advance by the granularity, rounded to cents, and the
    /// last bucket is clipped to `end`. A bucket with no price that can carry
    /// a label (`[0, 0.01)`) is skipped.
    pub fn expand(&self, exchange_rate: f64) -> Result<Vec<PriceBucket>> {
        validate_range(self.start, self.end, self.granularity)?;
        if !(exchange_rate.is_finite() && exchange_rate > 0.0) {
            return Err(SetupError::config(format!(
                "exchange rate {exchange_rate} must be a positive number"
            )));
        }

        let step = match self.granularity {
            Granularity::WholeRange => {
                return Ok(vec![PriceBucket::new(
                    self.start,
                    self.end,
                    Granularity::WholeRange.effective(),
                    self.rate_rule,
                    exchange_rate,
                )]);
            }
            Granularity::Step(g) => g,
        };

        let mut buckets = Vec::new();
        let mut i = self.start;
        while i < self.end {
            let a = round2(i + step).min(self.end);
            if crate::buckets::has_labels(i, a) {
                buckets.push(PriceBucket::new(i, a, step, self.rate_rule, exchange_rate));
            } else {
                warn!(start = i, end = a, "skipping price bucket without labels");
            }
            i = a;
        }
        Ok(buckets)
    }
}

/// The price span and rate of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBucket {
    pub start: f64,
    pub end: f64,
    pub granularity: f64,
    pub rate: f64,
}

impl PriceBucket {
    pub fn new(
        start: f64,
        end: f64,
        granularity: f64,
        rule: RateRule,
        exchange_rate: f64,
    ) -> Self {
        Self {
            start,
            end,
            granularity,
            rate: calculated_rate(start, end, rule, exchange_rate),
        }
    }

    /// Bucket labels targeted by this line item.
    pub fn labels(&self) -> Result<Vec<String>> {
        crate::buckets::partition(self.start, self.end, Granularity::Step(self.granularity))
    }

    pub fn micro_amount(&self) -> i64 {
        to_micro_amount(self.rate)
    }
}

/// Rate for a bucket in the network currency, rounded to three decimals.
///
/// The start rule falls back to the midpoint for a bucket starting at zero,
/// since a zero rate is not a usable bid.
pub fn calculated_rate(start: f64, end: f64, rule: RateRule, exchange_rate: f64) -> f64 {
    let rule = if start == 0.0 { RateRule::Midpoint } else { rule };
    let base = match rule {
        RateRule::Start => start,
        RateRule::Midpoint => (start + end) / 2.0,
    };
    round_to(base * exchange_rate, 3)
}

/// Convert a rate to the ad server's micro amount at cent precision.
pub fn to_micro_amount(rate: f64) -> i64 {
    (round2(rate) * 1_000_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: f64, end: f64, g: f64, rule: RateRule) -> PriceRange {
        PriceRange::new(start, end, Granularity::from_raw(g), rule).unwrap()
    }

    #[test]
    fn test_sentinel_is_whole_range() {
        assert_eq!(Granularity::from_raw(-1.0), Granularity::WholeRange);
        assert_eq!(Granularity::from_raw(0.5), Granularity::Step(0.5));
        assert_eq!(Granularity::WholeRange.effective(), 1.0);
    }

    #[test]
    fn test_rate_rule_ids() {
        assert_eq!(RateRule::from_id(1).unwrap(), RateRule::Midpoint);
        assert_eq!(RateRule::from_id(2).unwrap(), RateRule::Start);
        assert!(matches!(RateRule::from_id(3), Err(SetupError::Configuration(_))));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let g = Granularity::Step(0.1);
        assert!(matches!(
            validate_range(2.0, 1.0, g),
            Err(SetupError::InvalidRange(_))
        ));
        assert!(validate_range(1.0, 1.0, g).is_err());
        assert!(validate_range(-0.5, 1.0, g).is_err());
        assert!(validate_range(0.0, f64::NAN, g).is_err());
        assert!(validate_range(0.0, 1.0, Granularity::Step(0.0)).is_err());
        assert!(validate_range(0.0, 1.0, Granularity::Step(-2.0)).is_err());
        assert!(validate_range(0.0, 1.0, Granularity::WholeRange).is_ok());
    }

    #[test]
    fn test_expand_steps_and_clips_last_bucket() {
        let buckets = range(0.0, 1.0, 0.3, RateRule::Midpoint).expand(1.0).unwrap();
        let edges: Vec<(f64, f64)> = buckets.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(edges, vec![(0.0, 0.3), (0.3, 0.6), (0.6, 0.9), (0.9, 1.0)]);
        assert!(buckets.iter().all(|b| b.granularity == 0.3));
    }

    #[test]
    fn test_expand_rounds_edges_to_cents() {
        let buckets = range(0.0, 0.3, 0.1, RateRule::Start).expand(1.0).unwrap();
        let ends: Vec<f64> = buckets.iter().map(|b| b.end).collect();
        assert_eq!(ends, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_expand_skips_zero_cent_bucket() {
        let buckets = range(0.0, 0.05, 0.01, RateRule::Midpoint).expand(1.0).unwrap();
        let starts: Vec<f64> = buckets.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0.01, 0.02, 0.03, 0.04]);
        assert!(buckets.iter().all(|b| !b.labels().unwrap().is_empty()));
    }

    #[test]
    fn test_expand_whole_range_is_single_unit_bucket() {
        let buckets = range(5.0, 10.0, -1.0, RateRule::Midpoint).expand(1.0).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].granularity, 1.0);
        assert_eq!(buckets[0].rate, 7.5);
    }

    #[test]
    fn test_expand_rejects_bad_exchange_rate() {
        let r = range(0.0, 1.0, 0.1, RateRule::Start);
        assert!(r.expand(0.0).is_err());
        assert!(r.expand(f64::INFINITY).is_err());
    }

    #[test]
    fn test_calculated_rate_rules() {
        assert_eq!(calculated_rate(1.0, 2.0, RateRule::Start, 1.0), 1.0);
        assert_eq!(calculated_rate(1.0, 2.0, RateRule::Midpoint, 1.0), 1.5);
        // start at zero falls back to midpoint
        assert_eq!(calculated_rate(0.0, 0.1, RateRule::Start, 1.0), 0.05);
        assert_eq!(calculated_rate(1.0, 2.0, RateRule::Start, 0.8123), 0.812);
    }

    #[test]
    fn test_micro_amount() {
        assert_eq!(to_micro_amount(1.5), 1_500_000);
        assert_eq!(to_micro_amount(0.15), 150_000);
        assert_eq!(to_micro_amount(1.15), 1_150_000);
        assert_eq!(to_micro_amount(0.812), 810_000);
    }
}
