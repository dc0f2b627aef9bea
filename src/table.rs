//! Table-view sorting and per-column "contains" filters.
//!
//! Works over anything implementing [`Tabular`], so the same logic serves the
//! aggregate table and the plan list.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::adapter::CanonicalRow;
use crate::aggregate::Aggregate;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single table cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A row that exposes named columns.  `None` means the row has no value for
/// that column.
pub trait Tabular {
    fn cell(&self, column: &str) -> Option<Cell>;
}

impl Tabular for CanonicalRow {
    fn cell(&self, column: &str) -> Option<Cell> {
        let text = |s: &str| Some(Cell::Text(s.to_owned()));
        match column {
            "TestType" => text(&self.test_type),
            "TestPlan" => text(&self.test_plan),
            "TestPlanId" => text(&self.test_plan_id),
            "ProductArea" => text(&self.product_area),
            "TestPlanType" => text(&self.test_plan_type),
            "Release" => text(&self.release),
            "Date" => self.date.map(|d| Cell::Text(d.format("%Y-%m-%d").to_string())),
            "SimilarityPercent" => self.similarity_percent.map(Cell::Number),
            "Sim100" => Some(Cell::Number(self.sim100)),
            "Sim99" => Some(Cell::Number(self.sim99)),
            "SimLess" => Some(Cell::Number(self.sim_less)),
            _ => None,
        }
    }
}

impl Tabular for Aggregate {
    fn cell(&self, column: &str) -> Option<Cell> {
        match column {
            "ProductArea" => Some(Cell::Text(self.product_area.clone())),
            "Sim100" => Some(Cell::Number(self.sim100)),
            "Sim99" => Some(Cell::Number(self.sim99)),
            "SimLess" => Some(Cell::Number(self.sim_less)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Sort `rows` by `column`, stably.
///
/// A column is numeric when any row holds a number in it.  Numeric columns
/// substitute −∞ for missing values *before* the direction is applied, so
/// missing values lead when ascending and trail when descending.  Text columns
/// compare case-insensitively with missing values as `""`.
pub fn sort_rows<T: Tabular + Clone>(rows: &[T], column: &str, direction: Direction) -> Vec<T> {
    let numeric = rows
        .iter()
        .any(|r| matches!(r.cell(column), Some(Cell::Number(_))));

    let mut keyed: Vec<(SortKey, &T)> = rows
        .iter()
        .map(|r| (SortKey::of(r.cell(column), numeric), r))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ord = a.cmp(b);
        match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });

    keyed.into_iter().map(|(_, r)| r.clone()).collect()
}

enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(cell: Option<Cell>, numeric: bool) -> Self {
        if numeric {
            let n = match cell {
                Some(Cell::Number(n)) => n,
                Some(Cell::Text(s)) => s.trim().parse().unwrap_or(f64::NEG_INFINITY),
                None => f64::NEG_INFINITY,
            };
            SortKey::Number(if n.is_nan() { f64::NEG_INFINITY } else { n })
        } else {
            SortKey::Text(cell.map(|c| c.to_string()).unwrap_or_default().to_lowercase())
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // All keys in one sort share a kind.
            _ => Ordering::Equal,
        }
    }
}

// ---------------------------------------------------------------------------
// Column filters
// ---------------------------------------------------------------------------

/// Case-insensitive "contains" predicate on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub needle: String,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            needle: needle.into(),
        }
    }

    pub fn matches<T: Tabular>(&self, row: &T) -> bool {
        let needle = self.needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        row.cell(&self.column)
            .map(|c| c.to_string().to_lowercase().contains(&needle))
            .unwrap_or(false)
    }
}

/// Parses `COLUMN=NEEDLE`.
impl FromStr for ColumnFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((column, needle)) if !column.trim().is_empty() => {
                Ok(ColumnFilter::new(column.trim(), needle))
            }
            _ => Err(format!("column filter {s:?} is not COLUMN=TEXT")),
        }
    }
}

/// Rows matching every filter (AND across columns), in input order.
pub fn filter_rows<T: Tabular + Clone>(rows: &[T], filters: &[ColumnFilter]) -> Vec<T> {
    rows.iter()
        .filter(|r| filters.iter().all(|f| f.matches(*r)))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
