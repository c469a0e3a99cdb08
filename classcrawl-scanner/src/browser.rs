//! Headless Chrome page driver over the DevTools protocol.
//!
//! Pages are rendered and scripts run, so this is the driver to use when
//! class names are added client-side. Compiled only with the `browser`
//! feature.

use crate::driver::{NavigateOptions, PageDriver, PageQuery, ProxyCredentials, WaitCondition};
use crate::error::{Result, ScanError};
use chromiumoxide::auth::Credentials;
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Proxy server passed to Chrome as `--proxy-server`.
    pub proxy: Option<String>,
    /// Chrome executable. When unset chromiumoxide searches the usual
    /// install locations.
    pub chrome_path: Option<PathBuf>,
    pub chrome_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            chrome_path: None,
            chrome_args: Vec::new(),
        }
    }
}

pub struct BrowserPageDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserPageDriver {
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        info!("Launching browser (headless={})", options.headless);

        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(ref proxy) = options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu");
        for arg in &options.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| ScanError::Browser(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScanError::Browser(format!("failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ScanError::Browser(format!("failed to open page: {}", e)));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

impl BrowserPageDriver {
    /// Navigate and wait for the full `load` event.
    async fn goto_loaded(&self, url: &str) -> std::result::Result<Option<u16>, CdpError> {
        self.page.goto(url).await?;
        let request = self.page.wait_for_navigation_response().await?;
        Ok(request
            .and_then(|req| req.response.as_ref().map(|resp| resp.status))
            .and_then(|code| u16::try_from(code).ok()))
    }

    /// Navigate and return as soon as `DOMContentLoaded` fires, without
    /// waiting for images, stylesheets or frames.
    async fn goto_dom_content(&self, url: &str) -> Result<Option<u16>> {
        let failed = |e: CdpError| ScanError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        // Subscribe before navigating so no event is missed.
        let mut dom_ready = self
            .page
            .event_listener::<EventDomContentEventFired>()
            .await
            .map_err(failed)?;
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(failed)?;

        let navigated = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(failed)?
            .result;
        if let Some(reason) = navigated.error_text {
            return Err(ScanError::Navigation {
                url: url.to_string(),
                reason,
            });
        }

        let mut status = None;
        loop {
            tokio::select! {
                biased;
                Some(event) = responses.next(), if status.is_none() => {
                    let is_main_document = event.r#type == ResourceType::Document
                        && navigated.loader_id.as_ref() == Some(&event.loader_id);
                    if is_main_document {
                        status = u16::try_from(event.response.status).ok();
                    }
                }
                fired = dom_ready.next() => {
                    if fired.is_none() {
                        return Err(ScanError::Navigation {
                            url: url.to_string(),
                            reason: "page closed before DOMContentLoaded".to_string(),
                        });
                    }
                    break;
                }
            }
        }
        Ok(status)
    }
}

impl PageDriver for BrowserPageDriver {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<Option<u16>> {
        debug!("Navigating to {} (wait for {})", url, options.wait_until.as_str());

        let navigation = async {
            match options.wait_until {
                WaitCondition::DomContentLoaded => self.goto_dom_content(url).await,
                WaitCondition::Load => self.goto_loaded(url).await.map_err(|e| ScanError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
            }
        };

        tokio::time::timeout(options.timeout, navigation)
            .await
            .map_err(|_| ScanError::NavigationTimeout {
                url: url.to_string(),
                timeout: options.timeout,
            })?
    }

    async fn evaluate(&mut self, query: &PageQuery) -> Result<Value> {
        let result = self
            .page
            .evaluate(query.to_script())
            .await
            .map_err(|e| ScanError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn authenticate(&mut self, credentials: &ProxyCredentials) -> Result<()> {
        self.page
            .authenticate(Credentials {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .await
            .map_err(|e| ScanError::Authentication(e.to_string()))
    }

    async fn close(mut self) -> Result<()> {
        debug!("Closing browser");
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        closed
            .map(|_| ())
            .map_err(|e| ScanError::Browser(format!("failed to close browser: {}", e)))
    }
}
