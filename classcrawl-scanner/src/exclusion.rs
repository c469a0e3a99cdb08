use crate::normalize::NormalizedUrl;

/// Substring patterns that keep a URL out of the crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    patterns: Vec<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded(&self, url: &NormalizedUrl) -> bool {
        is_excluded(url.as_str(), &self.patterns)
    }
}

/// Case-sensitive, unanchored substring match against every pattern.
pub fn is_excluded<S: AsRef<str>>(url: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| url.contains(p.as_ref()))
}
