use crate::driver::{NavigateOptions, PageDriver, PageQuery, WaitCondition};
use crate::error::{Result, ScanError};
use crate::exclusion::ExclusionFilter;
use crate::frontier::Frontier;
use crate::normalize::{NormalizedUrl, normalize};
use crate::recorder::ResultRecorder;
use crate::result::{CrawlSummary, VisitRecord, VisitStatus};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Called with each record right after it is appended, and the visited count
/// at that point.
pub type VisitCallback = Arc<dyn Fn(&VisitRecord, usize) + Send + Sync>;

/// Single-host crawl loop.
///
/// Visits run strictly one after another: every navigation and page query is
/// awaited before the next one is issued, and the frontier and recorder are
/// owned by the running `crawl` call alone.
pub struct Crawler {
    target_class: String,
    exclusions: ExclusionFilter,
    navigation_timeout: Duration,
    evaluation_timeout: Option<Duration>,
    wait_until: WaitCondition,
    max_in_flight: usize,
    visit_callback: Option<VisitCallback>,
}

impl Crawler {
    pub fn new(target_class: impl Into<String>) -> Self {
        Self {
            target_class: target_class.into(),
            exclusions: ExclusionFilter::default(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            evaluation_timeout: Some(DEFAULT_EVALUATION_TIMEOUT),
            wait_until: WaitCondition::DomContentLoaded,
            max_in_flight: 1,
            visit_callback: None,
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionFilter) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Bound on each in-page query. `None` lets a hung query stall the crawl.
    pub fn with_evaluation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.evaluation_timeout = timeout;
        self
    }

    pub fn with_wait_condition(mut self, wait_until: WaitCondition) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// Upper bound on concurrent page visits. Only one visit is ever in
    /// flight today, so larger values are clamped to 1.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        if max_in_flight > 1 {
            warn!(
                "Concurrent visits are not supported; running with 1 instead of {}",
                max_in_flight
            );
        }
        self.max_in_flight = 1;
        self
    }

    pub fn with_visit_callback(mut self, callback: VisitCallback) -> Self {
        self.visit_callback = Some(callback);
        self
    }

    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Crawl every same-host page reachable from `seed`.
    ///
    /// Never fails: per-page problems become records, and a seed that does
    /// not parse yields an empty summary.
    pub async fn crawl<D: PageDriver>(&self, driver: &mut D, seed: &str) -> CrawlSummary {
        let mut recorder = ResultRecorder::new();

        let Some(seed_url) = normalize(seed) else {
            warn!("Seed URL '{}' is not an absolute URL; nothing to crawl", seed);
            return recorder.into_summary();
        };
        let base_host = seed_url.host();

        info!(
            "Starting crawl of {} looking for class '{}'",
            seed_url, self.target_class
        );

        let mut frontier = Frontier::new(self.exclusions.clone());
        frontier.enqueue(Some(seed_url));

        while let Some(current) = frontier.dequeue() {
            frontier.mark_visited(&current);
            recorder.count_visit();

            match self.inspect(driver, &current).await {
                Ok((status, found)) => {
                    self.push_record(&mut recorder, VisitRecord::new(current.clone(), status, found));
                }
                Err(e) => {
                    warn!("Error navigating to {}: {}", current, e);
                    self.push_record(&mut recorder, VisitRecord::failed(current));
                    continue;
                }
            }

            let links = match self.query::<Vec<String>, _>(driver, &PageQuery::Links).await {
                Ok(links) => links,
                Err(e) => {
                    warn!("Link extraction failed on {}: {}", current, e);
                    Vec::new()
                }
            };

            for link in links {
                if let Some(url) = scope_link(&link, base_host.as_deref())
                    && frontier.enqueue(Some(url.clone()))
                {
                    debug!("Queued {}", url);
                }
            }
        }

        let summary = recorder.into_summary();
        info!("Crawl complete. Visited {} pages", summary.total_visited);
        summary
    }

    /// Navigate to one page and search it for the target class. Only
    /// navigation failures surface as `Err`; a failed search counts as not
    /// found.
    async fn inspect<D: PageDriver>(
        &self,
        driver: &mut D,
        url: &NormalizedUrl,
    ) -> Result<(VisitStatus, bool)> {
        let options = NavigateOptions {
            wait_until: self.wait_until,
            timeout: self.navigation_timeout,
        };

        let navigated = tokio::time::timeout(self.navigation_timeout, driver.navigate(url.as_str(), options))
            .await
            .map_err(|_| ScanError::NavigationTimeout {
                url: url.to_string(),
                timeout: self.navigation_timeout,
            })??;

        let status = match navigated {
            Some(code) => VisitStatus::Code(code),
            None => VisitStatus::NoResponse,
        };

        let query = PageQuery::HasClass(self.target_class.clone());
        let found = match self.query::<bool, _>(driver, &query).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Class search failed on {}: {}", url, e);
                false
            }
        };

        Ok((status, found))
    }

    async fn query<T: DeserializeOwned, D: PageDriver>(
        &self,
        driver: &mut D,
        query: &PageQuery,
    ) -> Result<T> {
        let value = bounded(self.evaluation_timeout, driver.evaluate(query)).await?;
        serde_json::from_value(value).map_err(|e| ScanError::Evaluation(e.to_string()))
    }

    fn push_record(&self, recorder: &mut ResultRecorder, record: VisitRecord) {
        info!(
            "Visited: {} - Status: {} - Found: {}",
            record.url,
            record.status,
            if record.found { "Yes" } else { "No" }
        );
        let visited = recorder.visited();
        let record = recorder.record(record);
        if let Some(ref callback) = self.visit_callback {
            callback(record, visited);
        }
    }
}

async fn bounded<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ScanError::EvaluationTimeout(limit))?,
        None => fut.await,
    }
}

/// Keep a discovered link only if it is an absolute http(s) URL on the seed's
/// host, returning its normalized form.
pub fn scope_link(raw: &str, base_host: Option<&str>) -> Option<NormalizedUrl> {
    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        return None;
    }
    let url = normalize(raw)?;
    if url.host().as_deref() != base_host {
        debug!("Skipping off-host link {}", url);
        return None;
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ProxyCredentials;
    use serde_json::{Value, json};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// What a fake page does when the crawler touches it.
    #[derive(Clone)]
    enum FakePage {
        Html {
            status: Option<u16>,
            classes: Vec<&'static str>,
            links: Vec<String>,
        },
        NavigationFails,
        Hangs,
        BrokenScripts,
    }

    fn page(classes: &[&'static str], links: &[&str]) -> FakePage {
        FakePage::Html {
            status: Some(200),
            classes: classes.to_vec(),
            links: links.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[derive(Default)]
    struct FakeDriver {
        pages: HashMap<String, FakePage>,
        current: Option<FakePage>,
        navigations: Vec<String>,
        wait_conditions: Vec<WaitCondition>,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDriver {
        fn with(mut self, url: &str, page: FakePage) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }
    }

    impl PageDriver for FakeDriver {
        async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<Option<u16>> {
            self.navigations.push(url.to_string());
            self.wait_conditions.push(options.wait_until);
            self.events.lock().unwrap().push(format!("navigate {}", url));
            self.current = None;
            let page = self.pages.get(url).cloned().unwrap_or(FakePage::Html {
                status: Some(404),
                classes: vec![],
                links: vec![],
            });
            match page {
                FakePage::NavigationFails => Err(ScanError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                }),
                FakePage::Hangs => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Some(200))
                }
                FakePage::Html { status, .. } => {
                    self.current = Some(page);
                    Ok(status)
                }
                FakePage::BrokenScripts => {
                    self.current = Some(page);
                    Ok(Some(200))
                }
            }
        }

        async fn evaluate(&mut self, query: &PageQuery) -> Result<Value> {
            let event = match query {
                PageQuery::HasClass(_) => "class",
                PageQuery::Links => "links",
            };
            self.events.lock().unwrap().push(event.to_string());
            match (&self.current, query) {
                (Some(FakePage::Html { classes, .. }), PageQuery::HasClass(target)) => Ok(json!(
                    classes
                        .iter()
                        .any(|c| crate::driver::class_attribute_matches(c, target))
                )),
                (Some(FakePage::Html { links, .. }), PageQuery::Links) => Ok(json!(links)),
                _ => Err(ScanError::Evaluation("Execution context was destroyed".to_string())),
            }
        }

        async fn authenticate(&mut self, _credentials: &ProxyCredentials) -> Result<()> {
            Ok(())
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    fn urls(summary: &CrawlSummary) -> Vec<&str> {
        summary.records.iter().map(|r| r.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_finds_prefixed_class_on_seed() {
        let mut driver = FakeDriver::default().with(
            "https://example.com/",
            page(&["btn-primary"], &[]),
        );

        let summary = Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;

        assert_eq!(summary.total_visited, 1);
        let record = summary.record_for("https://example.com/").unwrap();
        assert!(record.found);
        assert_eq!(record.status, VisitStatus::Code(200));
    }

    #[tokio::test]
    async fn test_breadth_first_and_same_host_only() {
        let mut driver = FakeDriver::default()
            .with(
                "https://example.com/",
                page(
                    &["nav"],
                    &[
                        "https://example.com/a",
                        "https://example.com/b/",
                        "https://other.com/x",
                        "https://sub.example.com/y",
                        "mailto:hi@example.com",
                    ],
                ),
            )
            .with(
                "https://example.com/a",
                page(&["card"], &["https://example.com/c", "https://example.com/#top"]),
            )
            .with("https://example.com/b", page(&["card"], &["https://example.com/a#x"]))
            .with("https://example.com/c", page(&["card"], &[]));

        let summary = Crawler::new("card").crawl(&mut driver, "https://example.com").await;

        assert_eq!(
            urls(&summary),
            vec![
                "https://example.com/",
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c"
            ]
        );
        assert_eq!(summary.total_visited, 4);
        assert!(!summary.records[0].found);
        assert!(summary.records[1..].iter().all(|r| r.found));
        assert!(driver.navigations.iter().all(|u| u.starts_with("https://example.com/")));
    }

    #[tokio::test]
    async fn test_excluded_paths_never_visited() {
        let mut driver = FakeDriver::default()
            .with(
                "https://example.com/",
                page(&[], &["https://example.com/admin/users", "https://example.com/blog"]),
            )
            .with("https://example.com/blog", page(&[], &["https://example.com/admin"]));

        let summary = Crawler::new("btn")
            .with_exclusions(ExclusionFilter::new(["/admin"]))
            .crawl(&mut driver, "https://example.com/")
            .await;

        assert_eq!(urls(&summary), vec!["https://example.com/", "https://example.com/blog"]);
        assert_eq!(summary.total_visited, 2);
        assert!(!driver.navigations.iter().any(|u| u.contains("/admin")));
    }

    #[tokio::test]
    async fn test_excluded_seed_visits_nothing() {
        let mut driver = FakeDriver::default();
        let summary = Crawler::new("btn")
            .with_exclusions(ExclusionFilter::new(["example"]))
            .crawl(&mut driver, "https://example.com/")
            .await;

        assert!(summary.records.is_empty());
        assert_eq!(summary.total_visited, 0);
        assert!(driver.navigations.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_timeout_recorded_and_crawl_continues() {
        let mut driver = FakeDriver::default()
            .with(
                "https://example.com/",
                page(&[], &["https://example.com/slow", "https://example.com/fast"]),
            )
            .with("https://example.com/slow", FakePage::Hangs)
            .with("https://example.com/fast", page(&["btn"], &[]));

        let summary = Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;

        let slow = summary.record_for("https://example.com/slow").unwrap();
        assert_eq!(slow.status, VisitStatus::Error);
        assert!(!slow.found);
        assert!(summary.record_for("https://example.com/fast").unwrap().found);
        assert_eq!(summary.total_visited, 3);
    }

    #[tokio::test]
    async fn test_navigation_error_skips_link_extraction() {
        let mut driver = FakeDriver::default()
            .with("https://example.com/", page(&[], &["https://example.com/down"]))
            .with("https://example.com/down", FakePage::NavigationFails);

        let summary = Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;

        let down = summary.record_for("https://example.com/down").unwrap();
        assert_eq!(down.status, VisitStatus::Error);
        assert!(!down.found);
        assert_eq!(summary.records.len(), 2);
    }

    #[tokio::test]
    async fn test_evaluation_failure_defaults_to_not_found() {
        let mut driver =
            FakeDriver::default().with("https://example.com/", FakePage::BrokenScripts);

        let summary = Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;

        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.records[0].status, VisitStatus::Code(200));
        assert!(!summary.records[0].found);
    }

    #[tokio::test]
    async fn test_no_response_status() {
        let mut driver = FakeDriver::default().with(
            "https://example.com/",
            FakePage::Html {
                status: None,
                classes: vec!["btn"],
                links: vec![],
            },
        );

        let summary = Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;

        assert_eq!(summary.records[0].status, VisitStatus::NoResponse);
        assert!(summary.records[0].found);
    }

    #[tokio::test]
    async fn test_malformed_seed_yields_empty_summary() {
        let mut driver = FakeDriver::default();
        let summary = Crawler::new("btn").crawl(&mut driver, "not a url").await;

        assert!(summary.records.is_empty());
        assert_eq!(summary.total_visited, 0);
        assert!(driver.navigations.is_empty());
    }

    #[tokio::test]
    async fn test_each_url_visited_once_on_cyclic_site() {
        let all = [
            "https://example.com/",
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c",
        ];
        let mut driver = FakeDriver::default();
        for url in all {
            driver = driver.with(url, page(&[], &all));
        }

        let summary = Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;

        let unique: HashSet<&String> = driver.navigations.iter().collect();
        assert_eq!(unique.len(), driver.navigations.len());
        assert_eq!(summary.total_visited, 4);
    }

    #[tokio::test]
    async fn test_visit_callback_sees_every_record() {
        let seen: Arc<Mutex<Vec<(String, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut driver = FakeDriver::default()
            .with("https://example.com/", page(&[], &["https://example.com/a"]))
            .with("https://example.com/a", page(&[], &[]));

        Crawler::new("btn")
            .with_visit_callback(Arc::new(move |record: &VisitRecord, visited: usize| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((record.url.to_string(), visited));
            }))
            .crawl(&mut driver, "https://example.com/")
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("https://example.com/".to_string(), 1),
                ("https://example.com/a".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_record_appended_before_link_extraction() {
        let mut driver = FakeDriver::default().with("https://example.com/", page(&["btn"], &[]));
        let events = driver.events.clone();

        Crawler::new("btn")
            .with_visit_callback(Arc::new(move |record: &VisitRecord, _visited: usize| {
                events.lock().unwrap().push(format!("record {}", record.url));
            }))
            .crawl(&mut driver, "https://example.com/")
            .await;

        assert_eq!(
            *driver.events.lock().unwrap(),
            vec![
                "navigate https://example.com/".to_string(),
                "class".to_string(),
                "record https://example.com/".to_string(),
                "links".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_link_extraction_keeps_record() {
        let mut driver = FakeDriver::default().with("https://example.com/", FakePage::BrokenScripts);
        let recorded = Arc::new(Mutex::new(0usize));
        let recorded_clone = recorded.clone();

        let summary = Crawler::new("btn")
            .with_visit_callback(Arc::new(move |_record: &VisitRecord, _visited: usize| {
                *recorded_clone.lock().unwrap() += 1;
            }))
            .crawl(&mut driver, "https://example.com/")
            .await;

        assert_eq!(*recorded.lock().unwrap(), 1);
        assert_eq!(summary.records.len(), 1);
        assert_eq!(
            driver.events.lock().unwrap().last().map(String::as_str),
            Some("links")
        );
    }

    #[tokio::test]
    async fn test_wait_condition_reaches_driver() {
        let site = || {
            FakeDriver::default()
                .with("https://example.com/", page(&[], &["https://example.com/a"]))
                .with("https://example.com/a", page(&[], &[]))
        };

        let mut driver = site();
        Crawler::new("btn").crawl(&mut driver, "https://example.com/").await;
        assert_eq!(
            driver.wait_conditions,
            vec![WaitCondition::DomContentLoaded, WaitCondition::DomContentLoaded]
        );

        let mut driver = site();
        Crawler::new("btn")
            .with_wait_condition(WaitCondition::Load)
            .crawl(&mut driver, "https://example.com/")
            .await;
        assert_eq!(driver.wait_conditions, vec![WaitCondition::Load, WaitCondition::Load]);
    }

    #[test]
    fn test_scope_link() {
        let host = Some("example.com");
        assert!(scope_link("https://example.com/a#b", host).is_some());
        assert!(scope_link("http://example.com/a", host).is_some());
        assert!(scope_link("https://www.example.com/a", host).is_none());
        assert!(scope_link("ftp://example.com/a", host).is_none());
        assert!(scope_link("/relative", host).is_none());
        assert!(scope_link("javascript:void(0)", host).is_none());
    }

    #[test]
    fn test_max_in_flight_is_clamped() {
        assert_eq!(Crawler::new("x").with_max_in_flight(8).max_in_flight(), 1);
    }
}
