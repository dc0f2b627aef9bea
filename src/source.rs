//! Raw data acquisition: the static mock dataset and the live data service.
//!
//! Both sources produce a plain list of JSON rows with the dataset's
//! PascalCase field names; classification and adaptation happen afterwards
//! in [`crate::adapter`].

use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::{Map, Value};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Top-level keys of the mock file, in priority order.
const MOCK_KEYS: [&str; 3] = ["ChartDataFull", "TestPlans", "ChartData"];

/// `TestPlans` entry field → canonical field.
const TEST_PLAN_FIELDS: [(&str, &str); 4] = [
    ("testType", "TestType"),
    ("name", "TestPlan"),
    ("productArea", "ProductArea"),
    ("id", "TestPlanId"),
];

/// Live service field → canonical field.  `ProductArea` is only filled from
/// `SDDocumentCategory` when the row doesn't already carry one.
const LIVE_FIELDS: [(&str, &str); 3] = [
    ("ConfirmedDemand", "Sim100"),
    ("DelayedDemand", "Sim99"),
    ("UnconfirmedDemand", "SimLess"),
];

/// Rows requested per page from the live service.
const DEFAULT_PAGE_SIZE: usize = 500;

/// Upper bound on requests per fetch.
const MAX_PAGES: usize = 1_000;

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Where a dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Mock,
    Live,
}

impl DataOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            DataOrigin::Mock => "mock",
            DataOrigin::Live => "live",
        }
    }
}

// ---------------------------------------------------------------------------
// Mock dataset
// ---------------------------------------------------------------------------

/// Read the mock JSON file at `path` and return its raw rows.
pub fn load_mock(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading mock dataset {}", path.display()))?;
    let doc: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing mock dataset {}", path.display()))?;
    Ok(mock_rows(&doc))
}

/// Pick the source list out of a mock document.
///
/// The first of `ChartDataFull`, `TestPlans`, `ChartData` present as an array
/// wins.  `TestPlans` entries are field-mapped to the canonical names with a
/// null similarity, so the adapter derives their measures from the default.
pub fn mock_rows(doc: &Value) -> Vec<Value> {
    for key in MOCK_KEYS {
        let Some(rows) = doc.get(key).and_then(Value::as_array) else {
            continue;
        };
        debug!(key, rows = rows.len(), "mock source selected");
        if key == "TestPlans" {
            return rows.iter().map(map_test_plan).collect();
        }
        return rows.clone();
    }
    Vec::new()
}

fn map_test_plan(entry: &Value) -> Value {
    let mut out = Map::new();
    for (from, to) in TEST_PLAN_FIELDS {
        out.insert(to.to_owned(), entry.get(from).cloned().unwrap_or(Value::Null));
    }
    out.insert("SimilarityPercent".to_owned(), Value::Null);
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Live service
// ---------------------------------------------------------------------------

/// HTTP client bound to one live data-service entity set.
pub struct LiveClient {
    /// Entity set URL with no trailing slash.
    base_url: String,
    http: Client,
    /// Optional HTTP Basic Auth credentials `(username, password)`.
    auth: Option<(String, String)>,
    page_size: usize,
    max_pages: usize,
}

/// One decoded response page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<Value>,
    /// Server-driven continuation link (`d.__next` or `@odata.nextLink`).
    pub next: Option<String>,
}

impl LiveClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http,
            auth: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: MAX_PAGES,
        })
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every row.  Rows come back already field-mapped (see
    /// [`map_live_row`]).
    ///
    /// Once the service sends a continuation link, links are followed until a
    /// page arrives without one.  Otherwise `$skip` paging continues until an
    /// empty page.  A page identical to the one before it means the service
    /// ignores `$skip`, and ends the fetch.
    pub async fn fetch_rows(&self) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut skip = 0usize;
        let mut next: Option<String> = None;
        let mut following = false;
        let mut previous: Option<Vec<Value>> = None;

        for _ in 0..self.max_pages {
            let page = match next.take() {
                Some(link) => self.fetch_link(&link).await?,
                None => self.fetch_page(skip).await?,
            };
            if page.rows.is_empty() {
                return Ok(all);
            }
            if previous.as_ref() == Some(&page.rows) {
                warn!(skip, url = %self.base_url, "service repeated a page; ignoring the rest");
                return Ok(all);
            }

            let n = page.rows.len();
            all.extend(page.rows.iter().cloned().map(map_live_row));
            previous = Some(page.rows);

            match page.next {
                Some(link) => {
                    following = true;
                    next = Some(link);
                }
                None if following => return Ok(all),
                None => skip += n,
            }
        }

        bail!(
            "gave up on {} after {} pages ({} rows so far)",
            self.base_url,
            self.max_pages,
            all.len()
        )
    }

    async fn fetch_page(&self, skip: usize) -> Result<Page> {
        let req = self.http.get(&self.base_url).query(&[
            ("$format", "json"),
            ("$top", &self.page_size.to_string()),
            ("$skip", &skip.to_string()),
        ]);
        self.send(req, &self.base_url)
            .await
            .with_context(|| format!("fetching page (skip={skip})"))
    }

    /// Follow a continuation link, which may be relative to the entity set.
    async fn fetch_link(&self, link: &str) -> Result<Page> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("invalid service URL {}", self.base_url))?;
        let mut url = base
            .join(link)
            .with_context(|| format!("invalid continuation link {link:?}"))?;
        if !url.query_pairs().any(|(k, _)| k == "$format") {
            url.query_pairs_mut().append_pair("$format", "json");
        }
        let shown = url.to_string();
        self.send(self.http.get(url), &shown).await
    }

    async fn send(&self, mut req: RequestBuilder, url: &str) -> Result<Page> {
        if let Some((user, pass)) = &self.auth {
            req = req.basic_auth(user, Some(pass));
        }

        let response = req.send().await.with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("data service returned HTTP {status} for {url}: {body}");
        }

        let text = response.text().await?;
        debug!(url, bytes = text.len(), "page received");
        page_from_body(&text).with_context(|| format!("decoding page from {url}"))
    }
}

/// Split a service response body into rows and continuation link.
///
/// Accepts the V2 envelope `{"d":{"results":[..],"__next":".."}}`, the V4
/// envelope `{"value":[..],"@odata.nextLink":".."}` and a bare array.
pub fn page_from_body(text: &str) -> Result<Page> {
    let doc: Value = serde_json::from_str(text).context("response is not JSON")?;
    let link = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_owned);
    let page = match doc {
        Value::Array(rows) => Page { rows, next: None },
        Value::Object(mut obj) => {
            if let Some(Value::Array(rows)) = obj.remove("value") {
                let next = link(obj.get("@odata.nextLink").or_else(|| obj.get("odata.nextLink")));
                Page { rows, next }
            } else if let Some(Value::Object(mut d)) = obj.remove("d") {
                let Some(Value::Array(rows)) = d.remove("results") else {
                    bail!("response carries neither `value` nor `d.results`");
                };
                Page {
                    rows,
                    next: link(d.get("__next")),
                }
            } else {
                bail!("response carries neither `value` nor `d.results`");
            }
        }
        other => bail!("expected a JSON array or object, got {other}"),
    };
    Ok(page)
}

/// Rename live-service measure fields to the canonical measure names.
///
/// Fields the service already names canonically are left alone, and unknown
/// fields pass through.
pub fn map_live_row(row: Value) -> Value {
    let Value::Object(mut obj) = row else {
        return row;
    };

    if !obj.contains_key("ProductArea") {
        if let Some(v) = obj.remove("SDDocumentCategory") {
            obj.insert("ProductArea".to_owned(), v);
        }
    }
    for (from, to) in LIVE_FIELDS {
        if let Some(v) = obj.remove(from) {
            obj.insert(to.to_owned(), v);
        }
    }
    Value::Object(obj)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // --- mock selection ---

    #[test]
    fn chart_data_full_wins_over_others() {
        let doc = json!({
            "ChartData": [{"ProductArea": "legacy"}],
            "TestPlans": [{"name": "plan"}],
            "ChartDataFull": [{"TestPlan": "full"}],
        });
        assert_eq!(mock_rows(&doc), vec![json!({"TestPlan": "full"})]);
    }

    #[test]
    fn test_plans_are_field_mapped() {
        let doc = json!({
            "TestPlans": [{"testType": "Smoke", "name": "Checkout", "productArea": "Sales", "id": "TP-1", "extra": 1}],
            "ChartData": [{"ProductArea": "ignored"}],
        });
        let rows = mock_rows(&doc);
        assert_eq!(
            rows,
            vec![json!({
                "TestType": "Smoke",
                "TestPlan": "Checkout",
                "ProductArea": "Sales",
                "TestPlanId": "TP-1",
                "SimilarityPercent": null,
            })]
        );
    }

    #[test]
    fn legacy_chart_data_is_last_resort() {
        let doc = json!({"ChartData": [{"ProductArea": "A", "Sim100": 1}]});
        assert_eq!(mock_rows(&doc).len(), 1);
    }

    #[test]
    fn non_array_keys_are_skipped() {
        let doc = json!({"ChartDataFull": {"oops": true}, "ChartData": [{}]});
        assert_eq!(mock_rows(&doc), vec![json!({})]);
    }

    #[test]
    fn unknown_document_gives_no_rows() {
        assert!(mock_rows(&json!({"Other": []})).is_empty());
        assert!(mock_rows(&json!([1, 2])).is_empty());
    }

    #[test]
    fn load_mock_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mockData.json");
        std::fs::write(&path, r#"{"TestPlans":[{"name":"P"}]}"#).unwrap();
        let rows = load_mock(&path).unwrap();
        assert_eq!(rows[0]["TestPlan"], "P");
    }

    #[test]
    fn load_mock_reports_missing_file() {
        let err = load_mock(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(format!("{err:#}").contains("reading mock dataset"));
    }

    // --- live bodies ---

    #[test]
    fn body_v2_envelope() {
        let page = page_from_body(r#"{"d":{"results":[{"a":1},{"a":2}]}}"#).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.next, None);
    }

    #[test]
    fn body_v4_envelope_and_bare_array() {
        assert_eq!(page_from_body(r#"{"value":[{}]}"#).unwrap().rows.len(), 1);
        assert_eq!(page_from_body("[{}, {}, {}]").unwrap().rows.len(), 3);
    }

    #[test]
    fn body_continuation_links() {
        let v2 = page_from_body(r#"{"d":{"results":[{}],"__next":"Plans?$skiptoken=1"}}"#).unwrap();
        assert_eq!(v2.next.as_deref(), Some("Plans?$skiptoken=1"));
        let v4 = page_from_body(r#"{"value":[{}],"@odata.nextLink":"https://svc/Plans?p=2"}"#).unwrap();
        assert_eq!(v4.next.as_deref(), Some("https://svc/Plans?p=2"));
    }

    #[test]
    fn body_without_rows_is_an_error() {
        assert!(page_from_body(r#"{"error":"boom"}"#).is_err());
        assert!(page_from_body(r#"{"d":{"count":3}}"#).is_err());
        assert!(page_from_body("42").is_err());
        assert!(page_from_body("<html>").is_err());
    }

    // --- live paging against a local service ---

    type Requests = Arc<Mutex<Vec<String>>>;

    /// Serve `respond(request_target) -> (status, body)` on a loopback port.
    /// Returns the entity set URL and the log of request targets.
    async fn serve<F>(respond: F) -> (String, Requests)
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Requests = Arc::default();
        let log = Arc::clone(&requests);
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf);
                    let target = head.split_whitespace().nth(1).unwrap_or("/").to_owned();
                    log.lock().unwrap().push(target.clone());

                    let (status, body) = respond(&target);
                    let reply = format!(
                        "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(reply.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        (format!("http://{addr}/odata/Plans"), requests)
    }

    /// Numeric query parameter, with or without its `$` prefix encoded.
    fn param(target: &str, name: &str) -> Option<usize> {
        let query = target.split_once('?')?.1;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim_start_matches("%24").trim_start_matches('$');
            if k == name {
                v.parse().ok()
            } else {
                None
            }
        })
    }

    fn plans(range: std::ops::Range<usize>) -> Vec<Value> {
        range.map(|i| json!({"TestPlan": format!("P{i}")})).collect()
    }

    fn names(rows: &[Value]) -> Vec<&str> {
        rows.iter().filter_map(|r| r["TestPlan"].as_str()).collect()
    }

    #[tokio::test]
    async fn server_page_cap_below_top_still_fetches_everything() {
        let (url, requests) = serve(|target| {
            let skip = param(target, "skip").unwrap_or(0).min(250);
            let end = (skip + 100).min(250);
            (200, json!({ "value": plans(skip..end) }).to_string())
        })
        .await;

        let rows = LiveClient::new(url).unwrap().fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 250);
        assert_eq!(rows[249]["TestPlan"], "P249");
        // 100 + 100 + 50, then the empty page.
        assert_eq!(requests.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn service_ignoring_skip_is_not_duplicated() {
        let (url, requests) =
            serve(|_| (200, json!({ "d": { "results": plans(0..3) } }).to_string())).await;

        let rows = LiveClient::new(url).unwrap().fetch_rows().await.unwrap();
        assert_eq!(names(&rows), ["P0", "P1", "P2"]);
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn continuation_links_are_followed_until_absent() {
        let (url, requests) = serve(|target| {
            let body = if target.contains("skiptoken=2") {
                json!({ "d": { "results": plans(2..3) } })
            } else {
                json!({ "d": { "results": plans(0..2), "__next": "Plans?$skiptoken=2" } })
            };
            (200, body.to_string())
        })
        .await;

        let rows = LiveClient::new(url).unwrap().fetch_rows().await.unwrap();
        assert_eq!(names(&rows), ["P0", "P1", "P2"]);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("/odata/Plans?"));
        assert!(requests[1].contains("format=json"));
    }

    #[tokio::test]
    async fn endless_paging_is_cut_off() {
        let (url, _) = serve(|target| {
            let skip = param(target, "skip").unwrap_or(0);
            (200, json!([{ "TestPlan": format!("P{skip}") }]).to_string())
        })
        .await;

        let mut client = LiveClient::new(url).unwrap();
        client.max_pages = 3;
        let err = client.fetch_rows().await.unwrap_err();
        assert!(format!("{err:#}").contains("after 3 pages"));
    }

    #[tokio::test]
    async fn live_rows_are_field_mapped() {
        let (url, _) = serve(|target| {
            let body = if param(target, "skip") == Some(0) {
                json!([{ "SDDocumentCategory": "Sales", "ConfirmedDemand": 4 }])
            } else {
                json!([])
            };
            (200, body.to_string())
        })
        .await;

        let rows = LiveClient::new(url).unwrap().fetch_rows().await.unwrap();
        assert_eq!(rows, vec![json!({ "ProductArea": "Sales", "Sim100": 4 })]);
    }

    #[tokio::test]
    async fn http_error_is_reported_with_status() {
        let (url, _) = serve(|_| (503, "maintenance".to_owned())).await;
        let err = LiveClient::new(url).unwrap().fetch_rows().await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("503"));
        assert!(msg.contains("maintenance"));
    }

    // --- live field mapping ---

    #[test]
    fn live_row_measures_are_renamed() {
        let row = map_live_row(json!({
            "SDDocumentCategory": "Sales",
            "ConfirmedDemand": 7,
            "DelayedDemand": 2,
            "UnconfirmedDemand": 1,
            "TestPlan": "P",
        }));
        assert_eq!(
            row,
            json!({"ProductArea": "Sales", "Sim100": 7, "Sim99": 2, "SimLess": 1, "TestPlan": "P"})
        );
    }

    #[test]
    fn live_row_keeps_existing_product_area() {
        let row = map_live_row(json!({"ProductArea": "Finance", "SDDocumentCategory": "X"}));
        assert_eq!(row["ProductArea"], "Finance");
    }

    #[test]
    fn live_client_normalises_base_url() {
        let c = LiveClient::new("https://svc.example.com/odata/Plans/").unwrap();
        assert_eq!(c.base_url(), "https://svc.example.com/odata/Plans");
    }
}
