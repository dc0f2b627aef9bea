//! Single-plan detail lookup.

use serde::Serialize;

use crate::adapter::CanonicalRow;

/// The fields shown on a plan's detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlanDetail {
    #[serde(rename = "id")]
    pub id: String,
    pub test_plan: String,
    pub product_area: String,
    pub sim100: f64,
    pub sim99: f64,
    pub sim_less: f64,
    pub total: f64,
    /// False when nothing in the dataset matched and the detail is a stub.
    #[serde(skip)]
    pub found: bool,
}

/// Find the first row whose plan id, product area or plan name equals `id`.
///
/// No match yields a stub titled `id` with zero measures, so a stale link
/// still renders something.
pub fn lookup(rows: &[CanonicalRow], id: &str) -> PlanDetail {
    let id = id.trim();
    let hit = rows
        .iter()
        .find(|r| r.test_plan_id == id || r.product_area == id || r.test_plan == id);

    match hit {
        Some(r) => PlanDetail {
            id: non_empty(&r.test_plan_id, id),
            test_plan: non_empty(&r.test_plan, id),
            product_area: r.product_area.clone(),
            sim100: r.sim100,
            sim99: r.sim99,
            sim_less: r.sim_less,
            total: r.total(),
            found: true,
        },
        None => PlanDetail {
            id: id.to_owned(),
            test_plan: id.to_owned(),
            product_area: String::new(),
            sim100: 0.0,
            sim99: 0.0,
            sim_less: 0.0,
            total: 0.0,
            found: false,
        },
    }
}

fn non_empty(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_owned()
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, plan: &str, area: &str, sim100: f64) -> CanonicalRow {
        CanonicalRow {
            test_type: "Smoke".to_owned(),
            test_plan: plan.to_owned(),
            test_plan_id: id.to_owned(),
            product_area: area.to_owned(),
            similarity_percent: Some(95.0),
            sim100,
            sim99: 1.0,
            sim_less: 2.0,
            test_plan_type: String::new(),
            date: None,
            release: String::new(),
        }
    }

    #[test]
    fn finds_by_plan_id() {
        let rows = vec![row("TP-1", "Checkout", "Sales", 9.0), row("TP-2", "Ledger", "Finance", 4.0)];
        let d = lookup(&rows, "TP-2");
        assert!(d.found);
        assert_eq!(d.test_plan, "Ledger");
        assert_eq!(d.sim100, 4.0);
        assert_eq!(d.total, 7.0);
    }

    #[test]
    fn finds_by_area_or_name_first_match_wins() {
        let rows = vec![row("TP-1", "Finance", "Sales", 9.0), row("TP-2", "Ledger", "Finance", 4.0)];
        // Row 0 matches by plan name before row 1 matches by area.
        assert_eq!(lookup(&rows, "Finance").id, "TP-1");
    }

    #[test]
    fn missing_id_falls_back_to_requested_id() {
        let rows = vec![row("", "", "Sales", 1.0)];
        let d = lookup(&rows, "Sales");
        assert_eq!(d.id, "Sales");
        assert_eq!(d.test_plan, "Sales");
    }

    #[test]
    fn no_match_gives_zeroed_stub() {
        let d = lookup(&[], "  TP-404 ");
        assert!(!d.found);
        assert_eq!(d.id, "TP-404");
        assert_eq!(d.test_plan, "TP-404");
        assert_eq!((d.sim100, d.sim99, d.sim_less, d.total), (0.0, 0.0, 0.0, 0.0));
    }
}
