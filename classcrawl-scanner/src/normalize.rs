use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Canonical form of a URL used as the crawl's identity key.
///
/// The fragment is dropped and trailing slashes are removed from any path
/// longer than `/`. Two links that differ only in those respects produce the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hostname of the key, if the scheme carries one.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.0)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Normalize a raw URL string. Returns `None` when the input is not an
/// absolute URL.
pub fn normalize(raw: &str) -> Option<NormalizedUrl> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);

    if url.path().len() > 1 {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Some(NormalizedUrl(url.to_string()))
}
