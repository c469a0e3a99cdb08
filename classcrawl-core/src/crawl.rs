use crate::config::{ConfigError, CrawlOptions, Engine};
use classcrawl_scanner::{
    CrawlSummary, Crawler, ExclusionFilter, HttpPageDriver, PageDriver, ProxyCredentials,
    ScanError, VisitCallback, VisitRecord,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use classcrawl_scanner::{BrowserOptions, BrowserPageDriver};

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Execute a crawl with the given options
/// Returns the summary of every visited page. The page driver is closed on
/// every path once it has been created, including when proxy authentication
/// fails.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSummary, CrawlError> {
    options.validate()?;

    let progress_bar = if options.show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let visit_callback: VisitCallback = match progress_bar {
        Some(ref pb) => {
            let pb = pb.clone();
            Arc::new(move |record: &VisitRecord, visited: usize| {
                pb.set_message(format!(
                    "Crawling... {} pages visited - {}",
                    visited, record.url
                ));
                pb.tick();
            })
        }
        None => Arc::new(|_record: &VisitRecord, _visited: usize| {}),
    };

    let crawler = Crawler::new(options.class_name.clone())
        .with_exclusions(ExclusionFilter::new(options.paths_to_avoid.iter()))
        .with_navigation_timeout(options.navigation_timeout)
        .with_evaluation_timeout(options.evaluation_timeout)
        .with_wait_condition(options.wait_until)
        .with_visit_callback(visit_callback);

    let credentials = options.proxy.as_ref().and_then(|p| p.credentials());
    let proxy_url = options.proxy.as_ref().map(|p| p.url.clone());

    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Crawling {} for class '{}' ({} engine)",
            options.domain,
            options.class_name,
            options.engine.as_str()
        ));
    }

    let outcome = match options.engine {
        Engine::Http => {
            let driver = HttpPageDriver::with_proxy(proxy_url)?;
            run_with_driver(driver, &crawler, &options.domain, credentials.as_ref()).await
        }
        Engine::Browser => launch_browser(&options, proxy_url, &crawler, credentials.as_ref()).await,
    };

    if let Some(ref pb) = progress_bar {
        match &outcome {
            Ok(summary) => pb.finish_with_message(format!(
                "Crawl complete! {} pages visited",
                summary.total_visited
            )),
            Err(_) => pb.abandon_with_message("Crawl aborted"),
        }
    }

    outcome
}

#[cfg(feature = "browser")]
async fn launch_browser(
    options: &CrawlOptions,
    proxy_url: Option<String>,
    crawler: &Crawler,
    credentials: Option<&ProxyCredentials>,
) -> Result<CrawlSummary, CrawlError> {
    let driver = BrowserPageDriver::launch(BrowserOptions {
        headless: options.headless,
        proxy: proxy_url,
        chrome_path: options.chrome_path.clone(),
        ..Default::default()
    })
    .await?;
    run_with_driver(driver, crawler, &options.domain, credentials).await
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(
    _options: &CrawlOptions,
    _proxy_url: Option<String>,
    _crawler: &Crawler,
    _credentials: Option<&ProxyCredentials>,
) -> Result<CrawlSummary, CrawlError> {
    Err(ConfigError::BrowserUnavailable.into())
}

/// Authenticate if needed, crawl, then close the driver whatever happened.
pub async fn run_with_driver<D: PageDriver>(
    mut driver: D,
    crawler: &Crawler,
    seed: &str,
    credentials: Option<&ProxyCredentials>,
) -> Result<CrawlSummary, CrawlError> {
    if let Some(credentials) = credentials {
        debug!("Authenticating to proxy as {}", credentials.username);
        if let Err(e) = driver.authenticate(credentials).await {
            close_driver(driver).await;
            return Err(e.into());
        }
    }

    let summary = crawler.crawl(&mut driver, seed).await;
    info!(
        "Crawl finished: {} visited, {} with class '{}'",
        summary.total_visited,
        summary.found_count(),
        crawler.target_class()
    );

    close_driver(driver).await;
    Ok(summary)
}

async fn close_driver<D: PageDriver>(driver: D) {
    if let Err(e) = driver.close().await {
        warn!("Failed to close page driver: {}", e);
    }
}
