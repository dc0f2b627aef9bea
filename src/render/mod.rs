//! Shared rendering utilities used by all output backends.

pub mod markdown;
pub mod text;

use crate::aggregate::{Aggregate, PieSummary};
use crate::facets::Facets;
use crate::filter::Selection;
use crate::source::DataOrigin;

// ---------------------------------------------------------------------------
// Report input
// ---------------------------------------------------------------------------

/// Everything a backend needs to render one report.
pub struct Report<'a> {
    /// Where the data came from, shown in the header.
    pub source: &'a str,
    pub origin: DataOrigin,
    pub selection: &'a Selection,
    /// Values still on offer for each facet under `selection`.
    pub facets: &'a Facets,
    /// The aggregate rows on display, after table sort and filters.
    pub rows: &'a [Aggregate],
    pub pie: &'a PieSummary,
    /// Number of plans that passed the selection.
    pub plan_count: usize,
}

// ---------------------------------------------------------------------------
// Bars
// ---------------------------------------------------------------------------

/// Eighth-block glyphs for the partial cell at the end of a bar.
const EIGHTHS: [char; 8] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉'];

/// Horizontal bar `width` cells wide at full scale, proportional to
/// `value / max`.  Always exactly `width` chars, padded with spaces.
pub fn share_bar(value: f64, max: f64, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let ratio = if max > 0.0 && value > 0.0 {
        (value / max).min(1.0)
    } else {
        0.0
    };
    let eighths = (ratio * width as f64 * 8.0).round() as usize;
    let (full, part) = (eighths / 8, eighths % 8);

    let mut bar = "█".repeat(full);
    if full < width {
        bar.push(EIGHTHS[part]);
        bar.extend(std::iter::repeat(' ').take(width - full - 1));
    }
    bar
}

// ---------------------------------------------------------------------------
// Number formatting
// ---------------------------------------------------------------------------

/// Format an integer with thousands separators: `1234567` → `"1,234,567"`.
pub fn fmt_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let grouped: String = digits
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            let sep = (i > 0 && i % 3 == 0).then_some(',');
            sep.into_iter().chain(std::iter::once(c))
        })
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Measures are usually whole; show fractions only when present.
pub fn fmt_measure(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9e15 {
        fmt_count(v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// `part` as a percentage of `whole`, one decimal; `"–"` when `whole` is 0.
pub fn fmt_share(part: f64, whole: f64) -> String {
    if whole > 0.0 {
        format!("{:.1}%", part * 100.0 / whole)
    } else {
        "–".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Selection summary
// ---------------------------------------------------------------------------

/// `(label, value)` lines for every active axis of `s`; empty when nothing
/// is selected.
pub fn selection_lines(s: &Selection) -> Vec<(&'static str, String)> {
    let join = |set: &std::collections::BTreeSet<String>| {
        set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    };

    let mut out = Vec::new();
    if !s.test_type.is_empty() {
        out.push(("Test type", join(&s.test_type)));
    }
    if !s.product_area.is_empty() {
        out.push(("Product area", join(&s.product_area)));
    }
    if !s.test_plan.is_empty() {
        out.push(("Test plan", join(&s.test_plan)));
    }
    if !s.similarity.is_empty() {
        let tags: Vec<&str> = s.similarity.iter().map(|b| b.as_str()).collect();
        out.push(("Similarity", tags.join(" or ")));
    }
    match (s.date_from, s.date_to) {
        (None, None) => {}
        (from, to) => {
            let end = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "…".to_owned());
            out.push(("Dates", format!("{} → {}", end(from), end(to))));
        }
    }
    out
}

/// `"2 test types · 5 product areas · 12 plans"`.
pub fn offered_line(f: &Facets) -> String {
    let count = |n: usize, one: &str, many: &str| {
        format!("{} {}", fmt_count(n as i64), if n == 1 { one } else { many })
    };
    [
        count(f.test_types.keys().count(), "test type", "test types"),
        count(f.product_areas.keys().count(), "product area", "product areas"),
        count(f.test_plans.keys().count(), "plan", "plans"),
    ]
    .join(" · ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
