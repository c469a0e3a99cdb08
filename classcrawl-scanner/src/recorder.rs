use crate::result::{CrawlSummary, VisitRecord};

/// Append-only store of visit records plus the visited counter.
#[derive(Debug, Default)]
pub struct ResultRecorder {
    records: Vec<VisitRecord>,
    visited: usize,
}

impl ResultRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_visit(&mut self) {
        self.visited += 1;
    }

    pub fn record(&mut self, record: VisitRecord) -> &VisitRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn into_summary(self) -> CrawlSummary {
        CrawlSummary {
            records: self.records,
            total_visited: self.visited,
        }
    }
}
