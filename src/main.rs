mod adapter;
mod aggregate;
mod detail;
mod export;
mod facets;
mod filter;
mod render;
mod session;
mod source;
mod table;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adapter::DEFAULT_TOTAL_TESTS;
use export::{ExportOutcome, AGGREGATE_COLUMNS};
use facets::FacetId;
use filter::BucketTag;
use render::Report;
use session::{Dataset, SelectionChange, Session};
use source::{DataOrigin, LiveClient};
use table::{ColumnFilter, Direction};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "planscope",
    about = "Filter test plan similarity data and summarise it by product area"
)]
struct Args {
    /// Mock dataset (JSON with `ChartDataFull`, `TestPlans` or `ChartData`).
    #[arg(long, env = "PLANSCOPE_DATA")]
    data: Option<PathBuf>,

    /// Live data service entity set URL.  When it answers, its rows replace
    /// the mock dataset; when it fails, the mock dataset stays.
    #[arg(long, env = "PLANSCOPE_LIVE_URL")]
    live_url: Option<String>,

    /// HTTP Basic Auth username for the live service.
    #[arg(long, env = "PLANSCOPE_USERNAME")]
    username: Option<String>,

    /// HTTP Basic Auth password (paired with --username).
    #[arg(long, env = "PLANSCOPE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Tests per plan when deriving measures from a similarity percentage.
    #[arg(long, env = "PLANSCOPE_TOTAL_TESTS", default_value_t = DEFAULT_TOTAL_TESTS)]
    total_tests: u32,

    /// Test types to keep (repeatable or comma-separated; `ALL` picks every one).
    #[arg(long, value_delimiter = ',')]
    test_type: Vec<String>,

    /// Product areas to keep.
    #[arg(long, value_delimiter = ',')]
    product_area: Vec<String>,

    /// Test plans to keep.  Plans not offered under the chosen test types and
    /// product areas are dropped.
    #[arg(long, value_delimiter = ',')]
    test_plan: Vec<String>,

    /// Similarity buckets (lt96 … lt100); a plan passes if it is under any.
    #[arg(long, value_delimiter = ',')]
    similarity: Vec<BucketTag>,

    /// Earliest plan date, inclusive (YYYY-MM-DD).  Undated plans always pass.
    #[arg(long)]
    from: Option<String>,

    /// Latest plan date, inclusive (YYYY-MM-DD).
    #[arg(long)]
    to: Option<String>,

    /// Sort the product-area table by this column (e.g. `Sim100`).
    #[arg(long)]
    sort: Option<String>,

    /// Sort descending instead of ascending.
    #[arg(long, requires = "sort")]
    descending: bool,

    /// Keep table rows whose COLUMN contains TEXT, case-insensitively
    /// (repeatable, combined with AND).
    #[arg(long = "where", value_name = "COLUMN=TEXT")]
    filters: Vec<ColumnFilter>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also export the displayed product-area table as an .xlsx workbook.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Show one plan (by id, product area or name) instead of the report.
    #[arg(long)]
    detail: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.data.is_none() && args.live_url.is_none() {
        bail!("nothing to load; pass --data, --live-url, or both");
    }
    let changes = build_changes(&args)?;

    let mut session = load_session(&args).await?;
    for change in changes {
        session = session.with_change(change);
    }

    if let Some(id) = &args.detail {
        let d = detail::lookup(&session.dataset().rows, id);
        if !d.found {
            warn!(id = %id, "no plan matches; showing an empty detail");
        }
        let out = match args.format {
            OutputFormat::Json => serde_json::to_string_pretty(&d)?,
            _ => format!(
                "{} ({})\n  Product area  {}\n  Sim100        {}\n  Sim99         {}\n  SimLess       {}\n  Total         {}\n",
                d.test_plan,
                d.id,
                d.product_area,
                render::fmt_measure(d.sim100),
                render::fmt_measure(d.sim99),
                render::fmt_measure(d.sim_less),
                render::fmt_measure(d.total),
            ),
        };
        return emit(&args, &out);
    }

    let mut displayed = table::filter_rows(&session.summary().by_product_area, &args.filters);
    if let Some(column) = &args.sort {
        let direction = if args.descending {
            Direction::Descending
        } else {
            Direction::Ascending
        };
        displayed = table::sort_rows(&displayed, column, direction);
    }

    if let Some(path) = &args.export {
        match export::export_xlsx(&displayed, &AGGREGATE_COLUMNS, path)? {
            ExportOutcome::Written { path, rows } => {
                info!(rows, path = %path.display(), "exported");
            }
            ExportOutcome::NoData => eprintln!("no data to export"),
        }
    }

    let source_label = source_label(&args, &session);
    let report = Report {
        source: &source_label,
        origin: session.dataset().origin,
        selection: session.selection(),
        facets: session.facets(),
        rows: &displayed,
        pie: &session.summary().pie,
        plan_count: session.filtered().len(),
    };

    let out = match args.format {
        OutputFormat::Text => render::text::render(&report),
        OutputFormat::Markdown => render::markdown::render(&report)?,
        OutputFormat::Json => {
            let mut s = serde_json::to_string_pretty(&session.published())?;
            s.push('\n');
            s
        }
    };
    emit(&args, &out)
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the mock dataset, then try the live service on top of it.  A live
/// failure keeps whatever was loaded before, which may be nothing.
async fn load_session(args: &Args) -> Result<Session> {
    let mut session = Session::new(Dataset::empty());
    if let Some(path) = &args.data {
        let raw = source::load_mock(path)?;
        session = session.with_dataset(Dataset::ingest(
            Value::Array(raw),
            DataOrigin::Mock,
            args.total_tests,
        ));
    }
    if let Some(url) = &args.live_url {
        session = session.absorb(fetch_live(args, url).await);
    }
    Ok(session)
}

fn build_client(args: &Args, url: &str) -> Result<LiveClient> {
    let c = LiveClient::new(url)?;
    Ok(match (&args.username, &args.password) {
        (Some(u), Some(p)) => c.with_auth(u, p),
        _ => c,
    })
}

async fn fetch_live(args: &Args, url: &str) -> Result<Dataset> {
    let client = build_client(args, url)?;
    info!(url = client.base_url(), "fetching live rows");
    let raw = client.fetch_rows().await?;
    info!(rows = raw.len(), "live rows fetched");
    Ok(Dataset::ingest(Value::Array(raw), DataOrigin::Live, args.total_tests))
}

fn source_label(args: &Args, session: &Session) -> String {
    match (session.is_live(), &args.live_url, &args.data) {
        (true, Some(url), _) => url.clone(),
        (_, _, Some(path)) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        _ => "(no data)".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Selection changes implied by the CLI, in the order a user would make them:
/// upstream facets first so `--test-plan ALL` expands against the narrowed
/// plan list.
fn build_changes(args: &Args) -> Result<Vec<SelectionChange>> {
    let mut changes = Vec::new();

    for (facet, picks) in [
        (FacetId::TestType, &args.test_type),
        (FacetId::ProductArea, &args.product_area),
        (FacetId::TestPlan, &args.test_plan),
    ] {
        if !picks.is_empty() {
            changes.push(SelectionChange::Facet {
                facet,
                picks: picks.clone(),
            });
        }
    }

    if !args.similarity.is_empty() {
        changes.push(SelectionChange::Similarity(
            args.similarity.iter().copied().collect(),
        ));
    }

    let from = args.from.as_deref().map(|s| parse_date("--from", s)).transpose()?;
    let to = args.to.as_deref().map(|s| parse_date("--to", s)).transpose()?;
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            warn!(%f, %t, "--from is after --to; only undated plans will match");
        }
    }
    if from.is_some() || to.is_some() {
        changes.push(SelectionChange::DateRange { from, to });
    }

    Ok(changes)
}

fn parse_date(flag: &str, s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("{flag} value {s:?} is not YYYY-MM-DD"))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn emit(args: &Args, out: &str) -> Result<()> {
    match &args.output {
        Some(path) => std::fs::write(path, out)
            .with_context(|| format!("writing report to {}", path.display())),
        None => {
            print!("{out}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("planscope").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn facet_flags_accept_commas_and_repeats() {
        let a = args(&["--data", "x.json", "--test-type", "Smoke,Regression", "--test-type", "UI"]);
        assert_eq!(a.test_type, ["Smoke", "Regression", "UI"]);
    }

    #[test]
    fn changes_follow_upstream_first_order() {
        let a = args(&[
            "--data", "x.json",
            "--test-plan", "ALL",
            "--test-type", "Smoke",
            "--similarity", "lt97,lt100",
            "--from", "2024-01-01",
        ]);
        let changes = build_changes(&a).unwrap();
        assert!(matches!(changes[0], SelectionChange::Facet { facet: FacetId::TestType, .. }));
        assert!(matches!(changes[1], SelectionChange::Facet { facet: FacetId::TestPlan, .. }));
        assert_eq!(
            changes[2],
            SelectionChange::Similarity([BucketTag::Lt97, BucketTag::Lt100].into_iter().collect())
        );
        assert_eq!(
            changes[3],
            SelectionChange::DateRange {
                from: NaiveDate::from_ymd_opt(2024, 1, 1),
                to: None
            }
        );
    }

    #[test]
    fn bad_date_is_reported_with_flag() {
        let a = args(&["--data", "x.json", "--to", "01/02/2024"]);
        let err = build_changes(&a).unwrap_err().to_string();
        assert!(err.contains("--to"));
        assert!(err.contains("01/02/2024"));
    }

    #[test]
    fn unknown_bucket_is_rejected_by_parser() {
        let r = Args::try_parse_from(["planscope", "--data", "x", "--similarity", "lt50"]);
        assert!(r.is_err());
    }

    #[test]
    fn where_filters_parse() {
        let a = args(&["--data", "x", "--where", "ProductArea=sal", "--where", "Sim100=1"]);
        assert_eq!(a.filters.len(), 2);
        assert_eq!(a.filters[0], ColumnFilter::new("ProductArea", "sal"));
    }

    #[tokio::test]
    async fn failed_live_fetch_without_mock_leaves_an_empty_session() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{port}/odata/Plans");
        let s = load_session(&args(&["--live-url", url.as_str()])).await.unwrap();
        assert!(s.dataset().rows.is_empty());
        assert!(!s.is_live());
        assert_eq!(s.summary().pie.total(), 0.0);
    }

    #[tokio::test]
    async fn failed_live_fetch_keeps_mock_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mockData.json");
        std::fs::write(&path, r#"{"TestPlans":[{"name":"Checkout","productArea":"Sales"}]}"#).unwrap();
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{port}/odata/Plans");
        let data = path.to_string_lossy().into_owned();
        let s = load_session(&args(&["--data", data.as_str(), "--live-url", url.as_str()])).await.unwrap();
        assert_eq!(s.dataset().rows.len(), 1);
        assert!(!s.is_live());
    }

    #[test]
    fn source_label_prefers_file_name() {
        let a = args(&["--data", "/tmp/data/mockData.json"]);
        let s = Session::new(Dataset::empty());
        assert_eq!(source_label(&a, &s), "mockData.json");
    }
}
