use crate::driver::{NavigateOptions, PageDriver, PageQuery, ProxyCredentials, class_attribute_matches};
use crate::error::{Result, ScanError};
use reqwest::{Client, Proxy};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = "classcrawl/0.1";

/// Document held after a successful navigation.
struct LoadedPage {
    url: Url,
    body: String,
}

/// Page driver that fetches raw HTML with reqwest and answers queries over
/// the static DOM with scraper. No script runs, so class names added
/// client-side are invisible to it.
pub struct HttpPageDriver {
    client: Client,
    proxy: Option<String>,
    page: Option<LoadedPage>,
}

impl HttpPageDriver {
    pub fn new() -> Result<Self> {
        Self::with_proxy(None)
    }

    pub fn with_proxy(proxy: Option<String>) -> Result<Self> {
        let client = Self::build_client(proxy.as_deref(), None)?;
        Ok(Self {
            client,
            proxy,
            page: None,
        })
    }

    fn build_client(proxy: Option<&str>, credentials: Option<&ProxyCredentials>) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy_url) = proxy {
            let mut proxy = Proxy::all(proxy_url)
                .map_err(|e| ScanError::InvalidUrl(format!("proxy {}: {}", proxy_url, e)))?;
            if let Some(creds) = credentials {
                proxy = proxy.basic_auth(&creds.username, &creds.password);
            }
            builder = builder.proxy(proxy);
        }

        Ok(builder.build()?)
    }

    fn loaded(&self) -> Result<&LoadedPage> {
        self.page
            .as_ref()
            .ok_or_else(|| ScanError::Evaluation("no page loaded".to_string()))
    }
}

impl PageDriver for HttpPageDriver {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<Option<u16>> {
        self.page = None;
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| navigation_error(url, options, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        // A whole body is as loaded as a static page gets, so both wait
        // conditions end here. Non-HTML bodies are never read.
        let body = if is_html(&response) {
            response
                .text()
                .await
                .map_err(|e| navigation_error(url, options, e))?
        } else {
            debug!("Not HTML, skipping body of {}", final_url);
            String::new()
        };

        self.page = Some(LoadedPage {
            url: final_url,
            body,
        });
        Ok(Some(status))
    }

    async fn evaluate(&mut self, query: &PageQuery) -> Result<Value> {
        let page = self.loaded()?;
        let document = Html::parse_document(&page.body);

        match query {
            PageQuery::HasClass(target) => Ok(Value::Bool(document_has_class(&document, target))),
            PageQuery::Links => Ok(Value::from(document_links(&document, &page.url))),
        }
    }

    async fn authenticate(&mut self, credentials: &ProxyCredentials) -> Result<()> {
        if self.proxy.is_none() {
            debug!("No proxy configured; ignoring credentials for {}", credentials.username);
            return Ok(());
        }
        self.client = Self::build_client(self.proxy.as_deref(), Some(credentials))?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

fn navigation_error(url: &str, options: NavigateOptions, e: reqwest::Error) -> ScanError {
    if e.is_timeout() {
        ScanError::NavigationTimeout {
            url: url.to_string(),
            timeout: options.timeout,
        }
    } else {
        ScanError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Missing `Content-Type` is treated as HTML, as browsers sniff it.
fn is_html(response: &reqwest::Response) -> bool {
    match response.headers().get(reqwest::header::CONTENT_TYPE) {
        Some(value) => value
            .to_str()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml+xml")
            })
            .unwrap_or(false),
        None => true,
    }
}

fn document_has_class(document: &Html, target: &str) -> bool {
    let Ok(selector) = Selector::parse("[class]") else {
        return false;
    };
    document.select(&selector).any(|element| {
        element
            .value()
            .attr("class")
            .is_some_and(|cls| class_attribute_matches(cls, target))
    })
}

/// Resolved `href` of every anchor, like reading `a.href` in a browser:
/// relative to the first `<base href>` when there is one, else to the page.
fn document_links(document: &Html, page_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };
    let base = document_base(document, page_url);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}
