//! Price bucket partitioning.
//!
//! Turns a `[start, end)` price span into the ordered labels targeted on the
//! price key. Labels are matched by prefix at serve time, so `"1."` covers
//! every bid from 1.00 to 1.99 and `"2.5"` covers 2.50 to 2.59. Each label is
//! the coarsest prefix the granularity tier allows that stays inside the span.
//!
//! | granularity      | widest label | typical labels                        |
//! |------------------|--------------|---------------------------------------|
//! | `< 0.10`         | cent         | `0.05`, `0.06`                        |
//! | `0.10 .. 1.00`   | dime         | `0.3`, with `0.40`.. at ragged edges  |
//! | `>= 1.00`        | unit         | `3.`, with `3.5`/`3.50` near `end`    |
//!
//! The cursor is kept in whole cents, so `start` and `end` are rounded to
//! cents once and every later comparison is exact. A zero label would match
//! every bid, so a span starting at 0 begins at `0.01`.

use tracing::debug;

use crate::domain::error::Result;
use crate::domain::price::{validate_range, Granularity};

const CENTS_PER_DIME: i64 = 10;
const CENTS_PER_UNIT: i64 = 100;

/// Granularity tier of a partition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Cent,
    Dime,
    Unit,
}

impl Tier {
    pub fn for_granularity(granularity: f64) -> Self {
        if granularity < 0.10 {
            Tier::Cent
        } else if granularity < 1.0 {
            Tier::Dime
        } else {
            Tier::Unit
        }
    }

    /// Widest step, in cents, a single label may cover.
    fn widest(self) -> i64 {
        match self {
            Tier::Cent => 1,
            Tier::Dime => CENTS_PER_DIME,
            Tier::Unit => CENTS_PER_UNIT,
        }
    }
}

/// Whole cents in `x`, rounded half-to-even.
fn cents(x: f64) -> i64 {
    (x * 100.0).round_ties_even() as i64
}

/// First cent a label may start at.
fn first_cent(start: f64) -> i64 {
    cents(start).max(1)
}

/// Whether `[start, end)` contains any price that can carry a label.
pub fn has_labels(start: f64, end: f64) -> bool {
    first_cent(start) < cents(end)
}

/// Label for the prefix of `width` cents starting at cursor `c`.
fn label(c: i64, width: i64) -> String {
    let (units, rem) = (c / CENTS_PER_UNIT, c % CENTS_PER_UNIT);
    match width {
        CENTS_PER_UNIT => format!("{units}."),
        CENTS_PER_DIME => format!("{units}.{}", rem / CENTS_PER_DIME),
        _ => format!("{units}.{rem:02}"),
    }
}

/// Widest label width at cursor `c` that is aligned and ends at or before `end`.
fn step_at(c: i64, end: i64, tier: Tier) -> i64 {
    [CENTS_PER_UNIT, CENTS_PER_DIME]
        .into_iter()
        .filter(|w| *w <= tier.widest())
        .find(|w| c % w == 0 && c + w <= end)
        .unwrap_or(1)
}

/// Partition `[start, end)` into ordered price bucket labels.
///
/// `Granularity::WholeRange` partitions in unit steps. Labels are strictly
/// increasing, cover every cent of the span once and never reach `end`.
pub fn partition(start: f64, end: f64, granularity: Granularity) -> Result<Vec<String>> {
    validate_range(start, end, granularity)?;
    let g = granularity.effective();
    let tier = Tier::for_granularity(g);
    let end_cents = cents(end);

    let mut labels = Vec::new();
    let mut c = first_cent(start);
    while c < end_cents {
        let width = step_at(c, end_cents, tier);
        let l = label(c, width);
        debug!(label = %l, width, "price bucket label");
        labels.push(l);
        c += width;
    }
    debug!(
        start,
        end,
        granularity = g,
        count = labels.len(),
        "partitioned price range"
    );
    Ok(labels)
}
