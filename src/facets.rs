//! Facet index: the selectable values for each filter dimension.
//!
//! Test type and product area lists are built from the full dataset and never
//! react to the selection.  The test plan list is dependent: it only offers
//! plans reachable under the current test type / product area picks.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::adapter::CanonicalRow;
use crate::filter::Selection;

/// Key of the synthetic entry at the head of every facet list.
pub const ALL_KEY: &str = "ALL";

const ALL_LABEL: &str = "Select All";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The dimensions with a facet list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetId {
    TestType,
    ProductArea,
    TestPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetItem {
    pub key: String,
    pub label: String,
}

/// Ordered, de-duplicated facet values, always headed by the "ALL" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FacetList(Vec<FacetItem>);

impl FacetList {
    fn from_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = values
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();

        let mut items = Vec::with_capacity(distinct.len() + 1);
        items.push(FacetItem {
            key: ALL_KEY.to_owned(),
            label: ALL_LABEL.to_owned(),
        });
        items.extend(distinct.into_iter().map(|v| FacetItem {
            key: v.to_owned(),
            label: v.to_owned(),
        }));
        FacetList(items)
    }

    /// Concrete keys, sentinel excluded.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0[1..].iter().map(|i| i.key.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys().any(|k| k == key)
    }
}

/// Facet lists for every selectable dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub test_types: FacetList,
    pub product_areas: FacetList,
    pub test_plans: FacetList,
}

impl Facets {
    pub fn list(&self, facet: FacetId) -> &FacetList {
        match facet {
            FacetId::TestType => &self.test_types,
            FacetId::ProductArea => &self.product_areas,
            FacetId::TestPlan => &self.test_plans,
        }
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Build facet lists for `full` under the current `selection`.
pub fn build_facets(full: &[CanonicalRow], selection: &Selection) -> Facets {
    Facets {
        test_types: FacetList::from_values(full.iter().map(|r| r.test_type.as_str())),
        product_areas: FacetList::from_values(full.iter().map(|r| r.product_area.as_str())),
        test_plans: FacetList::from_values(
            full.iter()
                .filter(|r| selection.admits_upstream(r))
                .map(|r| r.test_plan.as_str()),
        ),
    }
}

/// Drop selected test plans that the rebuilt list no longer offers.
///
/// Test type and product area picks are left alone even when stale.
pub fn reconcile(selection: &Selection, facets: &Facets) -> Selection {
    Selection {
        test_plan: selection
            .test_plan
            .iter()
            .filter(|k| facets.test_plans.contains(k))
            .cloned()
            .collect(),
        ..selection.clone()
    }
}

/// Resolve picked keys for `facet` into the set to store.
///
/// Picking [`ALL_KEY`] is a one-shot expansion into every concrete key of the
/// facet's current list; the sentinel itself is never stored.
pub fn resolve_picks<S: AsRef<str>>(facet: FacetId, picks: &[S], facets: &Facets) -> BTreeSet<String> {
    if picks.iter().any(|p| p.as_ref().trim() == ALL_KEY) {
        return facets.list(facet).keys().map(str::to_owned).collect();
    }
    picks
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
