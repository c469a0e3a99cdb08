//! Run configuration: everything a crawl needs, resolved once from the
//! command line and the environment before the first navigation.

use classcrawl_scanner::{ProxyCredentials, WaitCondition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;

pub const PROXY_URL_VAR: &str = "PROXY_URL";
pub const PROXY_USER_VAR: &str = "PROXY_USER";
pub const PROXY_PASS_VAR: &str = "PROXY_PASS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("proxy mode requires {PROXY_URL_VAR} to be set")]
    MissingProxyUrl,

    #[error("invalid proxy URL '{0}': {1}")]
    InvalidProxyUrl(String, url::ParseError),

    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("unknown engine '{0}' (expected 'browser' or 'http')")]
    UnknownEngine(String),

    #[error("the browser engine is not compiled in; rebuild with `--features browser` or use --engine=http")]
    BrowserUnavailable,
}

/// Engine used to load and inspect pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// Headless Chrome; sees classes added by scripts.
    Browser,
    /// Plain HTTP fetch over the static HTML.
    Http,
}

impl Engine {
    pub fn is_available(&self) -> bool {
        match self {
            Engine::Browser => cfg!(feature = "browser"),
            Engine::Http => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Browser => "browser",
            Engine::Http => "http",
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        if cfg!(feature = "browser") {
            Engine::Browser
        } else {
            Engine::Http
        }
    }
}

impl FromStr for Engine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" | "chrome" => Ok(Engine::Browser),
            "http" | "static" => Ok(Engine::Http),
            other => Err(ConfigError::UnknownEngine(other.to_string())),
        }
    }
}

/// Proxy endpoint plus optional credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    /// Credentials to answer the proxy challenge with, present only when both
    /// user and password are set.
    pub fn credentials(&self) -> Option<ProxyCredentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(ProxyCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Resolve proxy settings from the process environment, falling back to
    /// values read from an env file. Variables already set in the process
    /// win, as with `dotenvy::dotenv`.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => default_env_file_vars(),
        };
        Self::from_sources(&file_vars, |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(file_vars: &HashMap<String, String>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            env(key)
                .or_else(|| file_vars.get(key).cloned())
                .filter(|v| !v.trim().is_empty())
        };

        let url = lookup(PROXY_URL_VAR).ok_or(ConfigError::MissingProxyUrl)?;
        Url::parse(&url).map_err(|e| ConfigError::InvalidProxyUrl(url.clone(), e))?;

        Ok(Self {
            url,
            username: lookup(PROXY_USER_VAR),
            password: lookup(PROXY_PASS_VAR),
        })
    }
}

/// Variables defined in an env file, without touching the process
/// environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let to_err = |source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };
    dotenvy::from_path_iter(path)
        .map_err(to_err)?
        .map(|item| item.map_err(to_err))
        .collect()
}

fn default_env_file_vars() -> HashMap<String, String> {
    let path = Path::new(".env");
    if !path.exists() {
        return HashMap::new();
    }
    read_env_file(path).unwrap_or_else(|e| {
        warn!("Ignoring {}: {}", path.display(), e);
        HashMap::new()
    })
}

/// Parse the `pathsToAvoid` value: optional surrounding parentheses, comma
/// separated, entries trimmed, empty entries dropped.
pub fn parse_paths_to_avoid(raw: &str) -> Vec<String> {
    let value = raw.trim();
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(value);

    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub domain: String,
    pub class_name: String,
    pub paths_to_avoid: Vec<String>,
    pub proxy: Option<ProxySettings>,
    pub engine: Engine,
    pub navigation_timeout: Duration,
    pub evaluation_timeout: Option<Duration>,
    pub wait_until: WaitCondition,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(domain: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            class_name: class_name.into(),
            paths_to_avoid: Vec::new(),
            proxy: None,
            engine: Engine::default(),
            navigation_timeout: classcrawl_scanner::crawler::DEFAULT_NAVIGATION_TIMEOUT,
            evaluation_timeout: Some(classcrawl_scanner::crawler::DEFAULT_EVALUATION_TIMEOUT),
            wait_until: WaitCondition::DomContentLoaded,
            headless: true,
            chrome_path: None,
            show_progress_bars: false,
        }
    }

    /// Checks that hold regardless of the seed URL. A malformed seed is not
    /// an error here; the crawl just comes back empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.engine.is_available() {
            return Err(ConfigError::BrowserUnavailable);
        }
        if self.navigation_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("navigation timeout"));
        }
        if self.evaluation_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout("evaluation timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_str() {
        assert_eq!("http".parse::<Engine>().unwrap(), Engine::Http);
        assert_eq!("BROWSER".parse::<Engine>().unwrap(), Engine::Browser);
        assert!(matches!(
            "lynx".parse::<Engine>(),
            Err(ConfigError::UnknownEngine(_))
        ));
    }

    #[test]
    fn test_default_engine_is_available() {
        assert!(Engine::default().is_available());
    }

    #[test]
    fn test_options_defaults_validate() {
        let options = CrawlOptions::new("https://example.com", "btn");
        assert!(options.validate().is_ok());
        assert_eq!(options.navigation_timeout, Duration::from_secs(30));
        assert_eq!(options.wait_until, WaitCondition::DomContentLoaded);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut options = CrawlOptions::new("https://example.com", "btn");
        options.navigation_timeout = Duration::ZERO;
        assert!(matches!(options.validate(), Err(ConfigError::ZeroTimeout(_))));
    }
}
