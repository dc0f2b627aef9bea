//! Plain-text terminal report.

use std::fmt::Write;

use super::{fmt_count, fmt_measure, fmt_share, offered_line, selection_lines, share_bar, Report};

/// Width of the boxed header, in columns.
const WIDTH: usize = 64;

const TITLE_PREFIX: &str = "planscope · ";

/// Width of the per-area bar.
const BAR_WIDTH: usize = 20;

/// Longest product-area name shown before truncation.
const AREA_WIDTH: usize = 24;

/// Render the report as box-drawn plain text.
pub fn render(report: &Report<'_>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, r: &Report<'_>) -> std::fmt::Result {
    let bar = "─".repeat(WIDTH);
    let origin = r.origin.as_str();
    // Cell is WIDTH - 2 wide; the prefix, " (" and ")" and the origin are fixed.
    let budget = WIDTH - 2 - TITLE_PREFIX.chars().count() - origin.len() - 3;
    let title = format!("{TITLE_PREFIX}{} ({origin})", truncate(r.source, budget));

    writeln!(out)?;
    writeln!(out, "┌{bar}┐")?;
    writeln!(out, "│  {title:<width$}│", width = WIDTH - 2)?;
    writeln!(out, "└{bar}┘")?;

    writeln!(out)?;
    if r.selection.is_empty() {
        writeln!(out, "  Selection      everything")?;
    } else {
        for (label, value) in selection_lines(r.selection) {
            writeln!(out, "  {label:<14} {value}")?;
        }
    }
    writeln!(out, "  Plans          {}", fmt_count(r.plan_count as i64))?;
    writeln!(out, "  Offered        {}", offered_line(r.facets))?;

    writeln!(out)?;
    if r.rows.is_empty() {
        writeln!(out, "  (no product areas match)")?;
    } else {
        let max = r.rows.iter().map(|a| a.total()).fold(0.0, f64::max);
        writeln!(
            out,
            "  {:<w$} {:>8} {:>8} {:>8}  {}",
            "Product area",
            "Sim100",
            "Sim99",
            "SimLess",
            "share",
            w = AREA_WIDTH,
        )?;
        for a in r.rows {
            writeln!(
                out,
                "  {:<w$} {:>8} {:>8} {:>8}  {}",
                truncate(&a.product_area, AREA_WIDTH),
                fmt_measure(a.sim100),
                fmt_measure(a.sim99),
                fmt_measure(a.sim_less),
                share_bar(a.total(), max, BAR_WIDTH).trim_end(),
                w = AREA_WIDTH,
            )?;
        }
    }

    let total = r.pie.total();
    writeln!(out)?;
    writeln!(out, "  Breakdown")?;
    for slice in r.pie.slices() {
        writeln!(
            out,
            "    {:<8} {:>10}  {:>6}  {}",
            slice.status.label(),
            fmt_measure(slice.count),
            fmt_share(slice.count, total),
            share_bar(slice.count, total, BAR_WIDTH).trim_end(),
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}…")
    }
}
