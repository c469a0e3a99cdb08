//! Capability interface between the crawl loop and whatever engine loads
//! pages. The loop only ever navigates, evaluates one of two queries, and
//! authenticates once; everything else about the engine stays behind this
//! trait.

use crate::error::Result;
use serde_json::Value;
use std::time::Duration;

/// Page lifecycle point at which navigation is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitCondition {
    #[default]
    DomContentLoaded,
    Load,
}

impl WaitCondition {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "domcontentloaded" | "dom" => Some(WaitCondition::DomContentLoaded),
            "load" => Some(WaitCondition::Load),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitCondition::DomContentLoaded => "domcontentloaded",
            WaitCondition::Load => "load",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait_until: WaitCondition,
    pub timeout: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitCondition::DomContentLoaded,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Queries the crawl loop runs inside a loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageQuery {
    /// Does any element carry a class token equal to, or starting with, the
    /// target? Evaluates to a JSON boolean.
    HasClass(String),
    /// Every anchor's resolved `href`, in document order, empty values
    /// omitted. Evaluates to a JSON array of strings.
    Links,
}

impl PageQuery {
    /// JavaScript expression equivalent to the query, for engines that
    /// evaluate inside a live DOM.
    pub fn to_script(&self) -> String {
        match self {
            PageQuery::HasClass(target) => {
                let target = Value::String(target.clone());
                format!(
                    r#"(() => {{
    const targetClass = {target};
    const nodes = document.querySelectorAll("[class]");
    return Array.from(nodes).some((el) => {{
        const cls = el.getAttribute("class");
        if (!cls) return false;
        return cls.split(/\s+/).some(
            (token) => token === targetClass || token.startsWith(targetClass)
        );
    }});
}})()"#
                )
            }
            PageQuery::Links => r#"(() => Array.from(document.querySelectorAll("a"))
    .map((a) => a.href)
    .filter(Boolean))()"#
                .to_string(),
        }
    }
}

/// Credentials answered to a proxy authentication challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

#[allow(async_fn_in_trait)]
pub trait PageDriver {
    /// Load `url`. `Ok(Some(code))` carries the main document's HTTP status,
    /// `Ok(None)` means the engine finished without a response object.
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<Option<u16>>;

    /// Run `query` against the currently loaded page.
    async fn evaluate(&mut self, query: &PageQuery) -> Result<Value>;

    async fn authenticate(&mut self, credentials: &ProxyCredentials) -> Result<()>;

    /// Release the engine. Called exactly once, on every exit path.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Class-attribute test shared by every engine: split on whitespace, match a
/// token that equals `target` or has it as a prefix.
pub fn class_attribute_matches(class_attr: &str, target: &str) -> bool {
    class_attr
        .split_whitespace()
        .any(|token| token == target || token.starts_with(target))
}
