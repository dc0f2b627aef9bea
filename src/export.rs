//! Spreadsheet export of the rows currently on display.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use crate::table::{Cell, Tabular};

// ---------------------------------------------------------------------------
// Column spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    Number,
}

/// One exported column: header label, source property and cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportColumn {
    pub label: &'static str,
    pub property: &'static str,
    pub kind: ColumnKind,
}

/// Columns of the aggregate table export.
pub const AGGREGATE_COLUMNS: [ExportColumn; 4] = [
    ExportColumn {
        label: "Product Area",
        property: "ProductArea",
        kind: ColumnKind::String,
    },
    ExportColumn {
        label: "Sim100",
        property: "Sim100",
        kind: ColumnKind::Number,
    },
    ExportColumn {
        label: "Sim99",
        property: "Sim99",
        kind: ColumnKind::Number,
    },
    ExportColumn {
        label: "SimLess",
        property: "SimLess",
        kind: ColumnKind::Number,
    },
];

const SHEET_NAME: &str = "Similarity";

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize },
    /// Nothing to export; no file was created.
    NoData,
}

/// Write `rows` as an `.xlsx` workbook at `path`: a bold header row followed
/// by one row per entry, typed per `columns`.
pub fn export_xlsx<T: Tabular>(rows: &[T], columns: &[ExportColumn], path: &Path) -> Result<ExportOutcome> {
    if rows.is_empty() {
        return Ok(ExportOutcome::NoData);
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (c, col) in columns.iter().enumerate() {
        let c = c as u16;
        sheet.write_string_with_format(0, c, col.label, &header)?;
        sheet.set_column_width(c, column_width(col))?;
    }

    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, col) in columns.iter().enumerate() {
            let c = c as u16;
            match (col.kind, row.cell(col.property)) {
                (_, None) => {}
                (ColumnKind::Number, Some(Cell::Number(n))) => {
                    sheet.write_number(r, c, if n.is_finite() { n } else { 0.0 })?;
                }
                (ColumnKind::Number, Some(Cell::Text(s))) => match s.trim().parse::<f64>() {
                    Ok(n) if n.is_finite() => {
                        sheet.write_number(r, c, n)?;
                    }
                    _ => {
                        sheet.write_number(r, c, 0.0)?;
                    }
                },
                (ColumnKind::String, Some(cell)) => {
                    sheet.write_string(r, c, cell.to_string())?;
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;

    Ok(ExportOutcome::Written {
        path: path.to_owned(),
        rows: rows.len(),
    })
}

fn column_width(col: &ExportColumn) -> f64 {
    match col.kind {
        ColumnKind::String => 28.0,
        ColumnKind::Number => (col.label.len() as f64 + 4.0).max(10.0),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
