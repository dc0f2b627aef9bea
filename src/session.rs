//! Session context: the loaded dataset, the current selection and everything
//! derived from them.
//!
//! A [`Session`] is a value.  Loading data or changing the selection produces
//! a new session whose derived views were computed from scratch, so a reader
//! never sees a half-updated snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{CanonicalRow, RawBatch};
use crate::aggregate::{aggregate, Aggregate, PieSummary, Summary};
use crate::facets::{build_facets, reconcile, resolve_picks, FacetId, Facets};
use crate::filter::{filter, BucketTag, Selection};
use crate::source::DataOrigin;

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// The full canonical dataset for a session, built once per load.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub rows: Vec<CanonicalRow>,
    pub origin: DataOrigin,
}

impl Dataset {
    /// Classify and adapt raw rows.  A non-array `raw` ingests as no rows.
    pub fn ingest(raw: Value, origin: DataOrigin, total_tests: u32) -> Self {
        let batch = RawBatch::from_value(raw);
        debug!(rows = batch.len(), rich = batch.is_rich(), ?origin, "ingesting batch");
        Dataset {
            rows: batch.adapt(total_tests),
            origin,
        }
    }

    pub fn empty() -> Self {
        Dataset {
            rows: Vec::new(),
            origin: DataOrigin::Mock,
        }
    }
}

// ---------------------------------------------------------------------------
// Selection changes
// ---------------------------------------------------------------------------

/// One user action on the selection controls.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    /// New picks for a facet.  May contain the "ALL" sentinel.
    Facet { facet: FacetId, picks: Vec<String> },
    Similarity(BTreeSet<BucketTag>),
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    dataset: Arc<Dataset>,
    selection: Selection,
    facets: Facets,
    filtered: Vec<CanonicalRow>,
    summary: Summary,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self::derive(Arc::new(dataset), Selection::default())
    }

    /// Everything downstream of `(dataset, selection)`.  Stale test plan picks
    /// are dropped here.
    fn derive(dataset: Arc<Dataset>, selection: Selection) -> Self {
        let facets = build_facets(&dataset.rows, &selection);
        let reconciled = reconcile(&selection, &facets);
        if reconciled.test_plan.len() != selection.test_plan.len() {
            debug!(
                dropped = selection.test_plan.len() - reconciled.test_plan.len(),
                "test plan picks no longer offered"
            );
        }
        let filtered = filter(&dataset.rows, &reconciled);
        let summary = aggregate(&filtered);
        Session {
            dataset,
            selection: reconciled,
            facets,
            filtered,
            summary,
        }
    }

    /// Replace the dataset, keeping the current selection.
    pub fn with_dataset(&self, dataset: Dataset) -> Self {
        info!(rows = dataset.rows.len(), origin = ?dataset.origin, "dataset loaded");
        Self::derive(Arc::new(dataset), self.selection.clone())
    }

    /// Take the outcome of a fetch.  A failed fetch leaves the session as it
    /// was.
    pub fn absorb(self, fetched: Result<Dataset>) -> Self {
        match fetched {
            Ok(dataset) => self.with_dataset(dataset),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "data fetch failed; keeping current dataset");
                self
            }
        }
    }

    /// Apply a selection change and recompute every view.
    pub fn with_change(&self, change: SelectionChange) -> Self {
        let current = &self.selection;
        let selection = match change {
            SelectionChange::Facet { facet, picks } => {
                let picked = resolve_picks(facet, &picks, &self.facets);
                match facet {
                    FacetId::TestType => Selection {
                        test_type: picked,
                        ..current.clone()
                    },
                    FacetId::ProductArea => Selection {
                        product_area: picked,
                        ..current.clone()
                    },
                    FacetId::TestPlan => Selection {
                        test_plan: picked,
                        ..current.clone()
                    },
                }
            }
            SelectionChange::Similarity(buckets) => Selection {
                similarity: buckets,
                ..current.clone()
            },
            SelectionChange::DateRange { from, to } => Selection {
                date_from: from,
                date_to: to,
                ..current.clone()
            },
        };
        Self::derive(Arc::clone(&self.dataset), selection)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_live(&self) -> bool {
        self.dataset.origin == DataOrigin::Live
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn filtered(&self) -> &[CanonicalRow] {
        &self.filtered
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// The named views presentation layers bind to.
    pub fn published(&self) -> PublishedViews<'_> {
        PublishedViews {
            chart_data: &self.summary.by_product_area,
            filtered_full: &self.filtered,
            pie_chart_data: &self.summary.pie,
            facets: &self.facets,
            selection: &self.selection,
            origin: self.dataset.origin,
        }
    }
}

/// Borrowed view of a session's derived state, serialised under the names
/// the dashboard binds to.
#[derive(Debug, Serialize)]
pub struct PublishedViews<'a> {
    #[serde(rename = "ChartData")]
    pub chart_data: &'a [Aggregate],
    #[serde(rename = "FilteredFull")]
    pub filtered_full: &'a [CanonicalRow],
    #[serde(rename = "PieChartData")]
    pub pie_chart_data: &'a PieSummary,
    #[serde(rename = "Facets")]
    pub facets: &'a Facets,
    #[serde(rename = "Selection")]
    pub selection: &'a Selection,
    #[serde(rename = "Origin")]
    pub origin: DataOrigin,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
