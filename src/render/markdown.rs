//! Markdown report renderer.

use anyhow::Result;
use minijinja::Environment;
use serde::Serialize;

use super::{fmt_count, fmt_measure, fmt_share, offered_line, selection_lines, Report};

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// The minijinja template that produces the markdown report.
///
/// Kept inline so the binary has no asset files to locate at runtime.
const TEMPLATE: &str = r#"## planscope · {{ source }}

_{{ mode }} data · {{ plan_count }} plans selected · {{ offered }} on offer_

{% if selection %}
| Filter | Value |
|:--|:--|
{% for f in selection %}| {{ f.label }} | {{ f.value }} |
{% endfor %}
{% else %}
_No filters applied._
{% endif %}

**By product area**

{% if rows %}
| Product area | Sim100 | Sim99 | SimLess |
|:-------------|-------:|------:|--------:|
{% for r in rows %}| {{ r.area }} | {{ r.sim100 }} | {{ r.sim99 }} | {{ r.sim_less }} |
{% endfor %}
{% else %}
_No product areas match._
{% endif %}

**Breakdown**

| Status | Count | Share |
|:--|--:|--:|
{% for s in pie %}| {{ s.status }} | {{ s.count }} | {{ s.share }} |
{% endfor %}
"#;

// ---------------------------------------------------------------------------
// Context types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FilterRow {
    label: &'static str,
    value: String,
}

#[derive(Serialize)]
struct AreaRow {
    area: String,
    sim100: String,
    sim99: String,
    sim_less: String,
}

#[derive(Serialize)]
struct PieRow {
    status: &'static str,
    count: String,
    share: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render the markdown report.
pub fn render(report: &Report<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);

    let selection: Vec<FilterRow> = selection_lines(report.selection)
        .into_iter()
        .map(|(label, value)| FilterRow {
            label,
            value: escape_cell(&value),
        })
        .collect();

    let rows: Vec<AreaRow> = report
        .rows
        .iter()
        .map(|a| AreaRow {
            area: escape_cell(&a.product_area),
            sim100: fmt_measure(a.sim100),
            sim99: fmt_measure(a.sim99),
            sim_less: fmt_measure(a.sim_less),
        })
        .collect();

    let total = report.pie.total();
    let pie: Vec<PieRow> = report
        .pie
        .slices()
        .iter()
        .map(|s| PieRow {
            status: s.status.label(),
            count: fmt_measure(s.count),
            share: fmt_share(s.count, total),
        })
        .collect();

    let ctx = minijinja::context! {
        source     => report.source,
        mode       => report.origin.as_str(),
        plan_count => fmt_count(report.plan_count as i64),
        offered    => offered_line(report.facets),
        selection  => selection,
        rows       => rows,
        pie        => pie,
    };

    Ok(env.render_str(TEMPLATE, ctx)?)
}

/// Pipes would split a table cell.
fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Summary};
    use crate::adapter::CanonicalRow;
    use crate::facets::build_facets;
    use crate::filter::{BucketTag, Selection};
    use crate::source::DataOrigin;

    fn row(area: &str, sim100: f64) -> CanonicalRow {
        CanonicalRow {
            test_type: "Smoke".to_owned(),
            test_plan: "P".to_owned(),
            test_plan_id: String::new(),
            product_area: area.to_owned(),
            similarity_percent: Some(95.0),
            sim100,
            sim99: 2.0,
            sim_less: 1.0,
            test_plan_type: String::new(),
            date: None,
            release: String::new(),
        }
    }

    fn md(summary: &Summary, selection: &Selection) -> String {
        render(&Report {
            source: "mockData.json",
            origin: DataOrigin::Mock,
            selection,
            facets: &build_facets(&[], selection),
            rows: &summary.by_product_area,
            pie: &summary.pie,
            plan_count: 2,
        })
        .unwrap()
    }

    #[test]
    fn renders_area_table_and_breakdown() {
        let summary = aggregate(&[row("Sales", 12_345.0), row("Finance", 3.0)]);
        let out = md(&summary, &Selection::default());
        assert!(out.starts_with("## planscope · mockData.json"));
        assert!(out.contains("2 plans selected · 0 test types · 0 product areas · 0 plans on offer"));
        assert!(out.contains("| Sales | 12,345 | 2 | 1 |"));
        assert!(out.contains("| Finance | 3 | 2 | 1 |"));
        assert!(out.contains("| Sim100 |"));
        assert!(out.contains("| SimLess |"));
        assert!(out.contains("_No filters applied._"));
    }

    #[test]
    fn renders_active_filters() {
        let summary = aggregate(&[row("Sales", 1.0)]);
        let sel = Selection {
            similarity: [BucketTag::Lt98].into_iter().collect(),
            ..Selection::default()
        };
        let out = md(&summary, &sel);
        assert!(out.contains("| Similarity | lt98 |"));
        assert!(!out.contains("_No filters applied._"));
    }

    #[test]
    fn empty_summary_renders_placeholder() {
        let summary = aggregate(&[]);
        let out = md(&summary, &Selection::default());
        assert!(out.contains("_No product areas match._"));
        assert!(out.contains("| Sim99 | 0 | – |"));
    }

    #[test]
    fn pipes_in_area_names_are_escaped() {
        let summary = aggregate(&[row("A|B", 1.0)]);
        let out = md(&summary, &Selection::default());
        assert!(out.contains(r"| A\|B |"));
    }
}
