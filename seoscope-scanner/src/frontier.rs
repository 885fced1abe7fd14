//! Crawl frontier: the queue of discovered pages plus the set of every URL
//! ever admitted to it.

use crate::error::{Result, ScanError};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
}

/// Canonical string form used for URL identity: parsed, fragment dropped,
/// re-serialized. Anything that does not parse is compared as trimmed text.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

#[derive(Default)]
struct FrontierState {
    seen: HashSet<String>,
    pending: VecDeque<FrontierEntry>,
}

pub struct CrawlFrontier {
    host: String,
    max_depth: Option<usize>,
    state: Mutex<FrontierState>,
}

impl CrawlFrontier {
    /// Seed a frontier with `start_url` at depth 0.
    pub fn new(start_url: &str) -> Result<Self> {
        let start = Url::parse(start_url.trim())
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;

        if !matches!(start.scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!(
                "{}: only http and https can be crawled",
                start_url
            )));
        }

        let host = start
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: URL has no host", start_url)))?
            .to_string();

        let root = normalize_url(start.as_str());
        let mut state = FrontierState::default();
        state.seen.insert(root.clone());
        state.pending.push_back(FrontierEntry { url: root, depth: 0 });

        Ok(Self {
            host,
            max_depth: None,
            state: Mutex::new(state),
        })
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn state(&self) -> MutexGuard<'_, FrontierState> {
        // No code panics while holding the lock; recover the guard anyway.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Normalized form of `link` if the crawl may follow it.
    pub fn admissible(&self, link: &str) -> Option<String> {
        let mut url = Url::parse(link.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if url.host_str() != Some(self.host.as_str()) {
            return None;
        }
        url.set_fragment(None);
        Some(url.to_string())
    }

    /// Enqueue the admissible, never-seen links found on `parent`'s page.
    ///
    /// Check-and-insert happens under one lock, so concurrent callers
    /// offering the same link enqueue it exactly once. Returns the entries
    /// this call added.
    pub fn offer(&self, parent: &FrontierEntry, links: &[String]) -> Vec<FrontierEntry> {
        let depth = parent.depth + 1;
        if let Some(max_depth) = self.max_depth
            && depth > max_depth
        {
            return Vec::new();
        }

        let candidates: Vec<String> = links.iter().filter_map(|l| self.admissible(l)).collect();

        let mut added = Vec::new();
        let mut state = self.state();
        for url in candidates {
            if state.seen.insert(url.clone()) {
                let entry = FrontierEntry { url, depth };
                state.pending.push_back(entry.clone());
                added.push(entry);
            }
        }
        drop(state);

        if !added.is_empty() {
            debug!("{} new links from {} at depth {}", added.len(), parent.url, depth);
        }
        added
    }

    /// Take the oldest pending entry.
    pub fn next_entry(&self) -> Option<FrontierEntry> {
        self.state().pending.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn seen_count(&self) -> usize {
        self.state().seen.len()
    }
}
