//! Selection state and the filter evaluator.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::adapter::CanonicalRow;

// ---------------------------------------------------------------------------
// Similarity buckets
// ---------------------------------------------------------------------------

/// A similarity-threshold predicate: `ltN` holds when a row's similarity
/// percentage is strictly below `N`.
///
/// Buckets overlap (`lt97` implies `lt98`); they are OR-ed, never a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketTag {
    Lt96,
    Lt97,
    Lt98,
    Lt99,
    Lt100,
}

impl BucketTag {
    pub const ALL: [BucketTag; 5] = [
        BucketTag::Lt96,
        BucketTag::Lt97,
        BucketTag::Lt98,
        BucketTag::Lt99,
        BucketTag::Lt100,
    ];

    pub fn threshold(self) -> f64 {
        match self {
            BucketTag::Lt96 => 96.0,
            BucketTag::Lt97 => 97.0,
            BucketTag::Lt98 => 98.0,
            BucketTag::Lt99 => 99.0,
            BucketTag::Lt100 => 100.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BucketTag::Lt96 => "lt96",
            BucketTag::Lt97 => "lt97",
            BucketTag::Lt98 => "lt98",
            BucketTag::Lt99 => "lt99",
            BucketTag::Lt100 => "lt100",
        }
    }

    pub fn matches(self, similarity_percent: f64) -> bool {
        similarity_percent < self.threshold()
    }
}

impl fmt::Display for BucketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BucketTag::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown similarity bucket {s:?}; expected one of lt96, lt97, lt98, lt99, lt100"))
    }
}

impl Serialize for BucketTag {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// The user's current filter state.  An empty set on any axis means "all".
///
/// Treated as a value: updates build a new `Selection` rather than mutating
/// the one a session currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub test_type: BTreeSet<String>,
    pub product_area: BTreeSet<String>,
    pub test_plan: BTreeSet<String>,
    pub similarity: BTreeSet<BucketTag>,
    /// Inclusive lower bound.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub date_to: Option<NaiveDate>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        *self == Selection::default()
    }

    /// True when `row` satisfies every axis of this selection.
    pub fn admits(&self, row: &CanonicalRow) -> bool {
        set_admits(&self.test_type, &row.test_type)
            && set_admits(&self.product_area, &row.product_area)
            && set_admits(&self.test_plan, &row.test_plan)
            && self.similarity_admits(row)
            && self.date_admits(row)
    }

    /// Restricted to the test type and product area axes; the test plan
    /// facet is computed from rows that pass this.
    pub(crate) fn admits_upstream(&self, row: &CanonicalRow) -> bool {
        set_admits(&self.test_type, &row.test_type)
            && set_admits(&self.product_area, &row.product_area)
    }

    fn similarity_admits(&self, row: &CanonicalRow) -> bool {
        if self.similarity.is_empty() {
            return true;
        }
        match row.similarity_percent {
            Some(pct) => self.similarity.iter().any(|b| b.matches(pct)),
            None => false,
        }
    }

    /// A row without a date always passes.
    fn date_admits(&self, row: &CanonicalRow) -> bool {
        let Some(date) = row.date else {
            return true;
        };
        self.date_from.map_or(true, |from| date >= from)
            && self.date_to.map_or(true, |to| date <= to)
    }
}

/// Exact, case-sensitive membership after trimming both sides.
fn set_admits(selected: &BTreeSet<String>, value: &str) -> bool {
    if selected.is_empty() {
        return true;
    }
    let value = value.trim();
    selected.iter().any(|s| s.trim() == value)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Rows of `full` admitted by `selection`, in their original order.
pub fn filter(full: &[CanonicalRow], selection: &Selection) -> Vec<CanonicalRow> {
    full.iter()
        .filter(|r| selection.admits(r))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
