use crate::normalize::NormalizedUrl;
use serde::{Serialize, Serializer};
use std::fmt;

/// Outcome of the navigation step for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// Navigation produced a response with this HTTP status code.
    Code(u16),
    /// Navigation finished but the engine reported no response object.
    NoResponse,
    /// Navigation failed or timed out.
    Error,
}

impl VisitStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            VisitStatus::Code(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, VisitStatus::Error)
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitStatus::Code(code) => write!(f, "{}", code),
            VisitStatus::NoResponse => f.write_str("no-response"),
            VisitStatus::Error => f.write_str("error"),
        }
    }
}

impl Serialize for VisitStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            VisitStatus::Code(code) => serializer.serialize_u16(*code),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitRecord {
    pub url: NormalizedUrl,
    pub status: VisitStatus,
    pub found: bool,
}

impl VisitRecord {
    pub fn new(url: NormalizedUrl, status: VisitStatus, found: bool) -> Self {
        Self { url, status, found }
    }

    pub fn failed(url: NormalizedUrl) -> Self {
        Self {
            url,
            status: VisitStatus::Error,
            found: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub records: Vec<VisitRecord>,
    pub total_visited: usize,
}

impl CrawlSummary {
    pub fn found_count(&self) -> usize {
        self.records.iter().filter(|r| r.found).count()
    }

    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.status.is_error()).count()
    }

    pub fn record_for(&self, url: &str) -> Option<&VisitRecord> {
        self.records.iter().find(|r| r.url.as_str() == url)
    }
}
