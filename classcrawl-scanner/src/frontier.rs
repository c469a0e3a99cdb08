use crate::exclusion::ExclusionFilter;
use crate::normalize::NormalizedUrl;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// FIFO visit queue plus the set of URLs already taken off it.
///
/// The queue may briefly hold duplicates of a URL that has not been visited
/// yet; `dequeue` drops them once the first copy has been marked visited, so
/// every URL is handed out at most once.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<NormalizedUrl>,
    visited: HashSet<NormalizedUrl>,
    exclusions: ExclusionFilter,
}

impl Frontier {
    pub fn new(exclusions: ExclusionFilter) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            exclusions,
        }
    }

    /// Queue `url` unless it is missing, already visited or excluded.
    /// Returns whether it was queued.
    pub fn enqueue(&mut self, url: Option<NormalizedUrl>) -> bool {
        let Some(url) = url else {
            return false;
        };
        if self.visited.contains(&url) {
            return false;
        }
        if self.exclusions.is_excluded(&url) {
            debug!("Excluded {}", url);
            return false;
        }
        self.queue.push_back(url);
        true
    }

    /// Next URL that has not been visited and is not excluded.
    pub fn dequeue(&mut self) -> Option<NormalizedUrl> {
        while let Some(url) = self.queue.pop_front() {
            if self.visited.contains(&url) || self.exclusions.is_excluded(&url) {
                continue;
            }
            return Some(url);
        }
        None
    }

    pub fn mark_visited(&mut self, url: &NormalizedUrl) {
        self.visited.insert(url.clone());
    }
}
