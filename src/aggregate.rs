//! Aggregation of filtered rows into chart-ready summaries.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::adapter::CanonicalRow;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Measure totals for one product area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Aggregate {
    pub product_area: String,
    pub sim100: f64,
    pub sim99: f64,
    pub sim_less: f64,
}

impl Aggregate {
    pub fn total(&self) -> f64 {
        self.sim100 + self.sim99 + self.sim_less
    }
}

/// The three pie segments, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PieStatus {
    Sim100,
    Sim99,
    SimLess,
}

impl PieStatus {
    pub fn label(self) -> &'static str {
        match self {
            PieStatus::Sim100 => "Sim100",
            PieStatus::Sim99 => "Sim99",
            PieStatus::SimLess => "SimLess",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PieSlice {
    pub status: PieStatus,
    pub count: f64,
}

/// Exactly three slices, fixed order `Sim100, Sim99, SimLess`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PieSummary(pub [PieSlice; 3]);

impl PieSummary {
    pub fn slices(&self) -> &[PieSlice; 3] {
        &self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|s| s.count).sum()
    }
}

/// Everything the table and charts need from one filtered row set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// One entry per non-blank product area, ascending.
    pub by_product_area: Vec<Aggregate>,
    /// Totals across *all* rows, including those with a blank area.
    pub pie: PieSummary,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Reduce `rows` into per-area totals and the pie breakdown.
///
/// Non-finite measures count as zero.
pub fn aggregate(rows: &[CanonicalRow]) -> Summary {
    let mut groups: BTreeMap<&str, Aggregate> = BTreeMap::new();
    let (mut sim100, mut sim99, mut sim_less) = (0.0, 0.0, 0.0);

    for row in rows {
        let (a, b, c) = (measure(row.sim100), measure(row.sim99), measure(row.sim_less));
        sim100 += a;
        sim99 += b;
        sim_less += c;

        let area = row.product_area.trim();
        if area.is_empty() {
            continue;
        }
        let g = groups.entry(area).or_insert_with(|| Aggregate {
            product_area: area.to_owned(),
            sim100: 0.0,
            sim99: 0.0,
            sim_less: 0.0,
        });
        g.sim100 += a;
        g.sim99 += b;
        g.sim_less += c;
    }

    Summary {
        by_product_area: groups.into_values().collect(),
        pie: PieSummary([
            PieSlice {
                status: PieStatus::Sim100,
                count: sim100,
            },
            PieSlice {
                status: PieStatus::Sim99,
                count: sim99,
            },
            PieSlice {
                status: PieStatus::SimLess,
                count: sim_less,
            },
        ]),
    }
}

fn measure(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
