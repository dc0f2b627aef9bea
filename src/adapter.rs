//! Row adapter: normalises heterogeneous raw rows into [`CanonicalRow`]s.
//!
//! Raw rows arrive either *minimal* (type, name, area, id, maybe a similarity
//! percentage) or *rich* (already carrying the derived measures).  Which one a
//! batch is gets decided once, at ingestion, by [`RawBatch::classify`]; the
//! adapter never re-derives measures for a rich batch.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of tests a minimal row's similarity percentage is spread across.
pub const DEFAULT_TOTAL_TESTS: u32 = 100;

/// Similarity assumed for a minimal row whose percentage is absent or garbage.
pub const DEFAULT_SIMILARITY_PERCENT: f64 = 95.0;

/// Suffix appended to the first token of the test type to form a plan type.
const PLAN_TYPE_SUFFIX: &str = "-auto";

// ---------------------------------------------------------------------------
// Canonical row
// ---------------------------------------------------------------------------

/// One test plan, normalised to the pipeline's fixed schema.
///
/// Serialises with the dataset's PascalCase field names so adapted rows can be
/// fed straight back in (they classify as rich, see [`RawBatch::classify`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CanonicalRow {
    pub test_type: String,
    /// Display name of the plan.
    pub test_plan: String,
    pub test_plan_id: String,
    pub product_area: String,
    /// Always `Some` for derived rows.  Rich rows keep whatever they carried,
    /// and a rich row without a percentage never satisfies a similarity bucket.
    pub similarity_percent: Option<f64>,
    /// Tests matching at 100%.
    pub sim100: f64,
    /// Tests matching at ≥ 99% but < 100%.
    pub sim99: f64,
    /// Tests matching below 99%.
    pub sim_less: f64,
    pub test_plan_type: String,
    pub date: Option<NaiveDate>,
    pub release: String,
}

impl CanonicalRow {
    /// `sim100 + sim99 + sim_less`.
    pub fn total(&self) -> f64 {
        self.sim100 + self.sim99 + self.sim_less
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// A raw batch, tagged with its schema at ingestion time.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBatch {
    /// At least one row already carried `Sim100` or `TestPlanType`: the whole
    /// batch is taken as-is.
    Rich(Vec<Value>),
    /// No row carried derived fields: every row gets its measures derived.
    Minimal(Vec<Value>),
}

impl RawBatch {
    /// Tag `rows` as rich or minimal.
    ///
    /// All-or-nothing: a single rich row makes the whole batch rich, so a mixed
    /// batch is never partially re-derived.
    pub fn classify(rows: Vec<Value>) -> Self {
        if rows.iter().any(is_rich) {
            RawBatch::Rich(rows)
        } else {
            RawBatch::Minimal(rows)
        }
    }

    /// Tag an untyped JSON value.  Anything that isn't an array is an empty
    /// batch.
    pub fn from_value(raw: Value) -> Self {
        match raw {
            Value::Array(rows) => Self::classify(rows),
            _ => RawBatch::Minimal(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawBatch::Rich(rows) | RawBatch::Minimal(rows) => rows.len(),
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, RawBatch::Rich(_))
    }

    /// Produce canonical rows.  Never fails; malformed fields fall back to
    /// defaults (minimal batches) or zero / absent (rich batches).
    pub fn adapt(&self, total_tests: u32) -> Vec<CanonicalRow> {
        match self {
            RawBatch::Rich(rows) => rows.iter().map(|r| read_rich(r.as_object())).collect(),
            RawBatch::Minimal(rows) => rows
                .iter()
                .map(|r| derive_minimal(r.as_object(), total_tests))
                .collect(),
        }
    }
}

/// A row is rich when it *defines* `Sim100` or `TestPlanType`.  An explicit
/// `null` still counts as defined.
fn is_rich(row: &Value) -> bool {
    row.as_object()
        .is_some_and(|o| o.contains_key("Sim100") || o.contains_key("TestPlanType"))
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// The three measures derived from a similarity percentage.
///
/// `sim_less` absorbs all rounding slack, so for `0 <= percent <= 100` the
/// three always sum to `total_tests`.
pub fn derive_measures(percent: f64, total_tests: u32) -> (f64, f64, f64) {
    let total = f64::from(total_tests);
    let sim100 = (total * percent / 100.0).round().max(0.0);
    let remainder = (total - sim100).max(0.0);
    let sim99 = (remainder * 0.5).round().max(0.0);
    let sim_less = (total - sim100 - sim99).max(0.0);
    (sim100, sim99, sim_less)
}

/// `"Regression Suite"` → `"Regression-auto"`; blank → `"Unknown-auto"`.
pub fn default_plan_type(test_type: &str) -> String {
    let first = test_type.split_whitespace().next().unwrap_or("Unknown");
    format!("{first}{PLAN_TYPE_SUFFIX}")
}

fn derive_minimal(row: Option<&Map<String, Value>>, total_tests: u32) -> CanonicalRow {
    let percent = number(row, "SimilarityPercent").unwrap_or(DEFAULT_SIMILARITY_PERCENT);
    let (sim100, sim99, sim_less) = derive_measures(percent, total_tests);
    let test_type = text(row, "TestType");
    // A minimal row never carries a plan type; it would have classified rich.
    let test_plan_type = default_plan_type(&test_type);

    CanonicalRow {
        test_plan: text(row, "TestPlan"),
        test_plan_id: text(row, "TestPlanId"),
        product_area: text(row, "ProductArea"),
        similarity_percent: Some(percent),
        sim100,
        sim99,
        sim_less,
        test_plan_type,
        date: date(row, "Date"),
        release: text(row, "Release"),
        test_type,
    }
}

fn read_rich(row: Option<&Map<String, Value>>) -> CanonicalRow {
    CanonicalRow {
        test_type: text(row, "TestType"),
        test_plan: text(row, "TestPlan"),
        test_plan_id: text(row, "TestPlanId"),
        product_area: text(row, "ProductArea"),
        similarity_percent: number(row, "SimilarityPercent"),
        sim100: number(row, "Sim100").unwrap_or(0.0),
        sim99: number(row, "Sim99").unwrap_or(0.0),
        sim_less: number(row, "SimLess").unwrap_or(0.0),
        test_plan_type: text(row, "TestPlanType"),
        date: date(row, "Date"),
        release: text(row, "Release"),
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

fn text(row: Option<&Map<String, Value>>, key: &str) -> String {
    row.and_then(|o| o.get(key)).map(value_text).unwrap_or_default()
}

/// String form of a scalar JSON value; `null` and containers become `""`.
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// A finite number from a JSON number or a numeric string.
fn number(row: Option<&Map<String, Value>>, key: &str) -> Option<f64> {
    let v = match row?.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part (`T...` or ` ...`).
fn date(row: Option<&Map<String, Value>>, key: &str) -> Option<NaiveDate> {
    let s = row?.get(key)?.as_str()?.trim();
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
