use crate::error::{Result, ScanError};
use crate::events::{ProgressEvent, ProgressReporter};
use crate::frontier::{CrawlFrontier, FrontierEntry};
use crate::renderer::{HttpRenderer, PageRenderer, RenderedPage};
use crate::result::{CrawlFailure, CrawlOutput, PageRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_PAGES: usize = 1000;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub max_pages: usize,
    /// Pages rendered at the same time.
    pub concurrency: usize,
    pub max_depth: Option<usize>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: 10,
            max_depth: None,
            timeout: Duration::from_secs(30),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }
}

pub struct Crawler {
    renderer: Arc<dyn PageRenderer>,
    config: CrawlConfig,
}

impl Crawler {
    /// Crawler backed by the plain HTTP renderer.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let renderer = HttpRenderer::new(config.timeout, &config.user_agent)?;
        Ok(Self::with_renderer(Arc::new(renderer), config))
    }

    pub fn with_renderer(renderer: Arc<dyn PageRenderer>, config: CrawlConfig) -> Self {
        Self { renderer, config }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Crawl the site behind `start_url`.
    ///
    /// Pages are dispatched only while `recorded + in flight < max_pages`,
    /// so the run ends with at most `max_pages` records even though
    /// in-flight renders are never cancelled. Pages the renderer cannot load
    /// become [`CrawlFailure`]s and the crawl carries on.
    pub async fn crawl(&self, start_url: &str, progress: &ProgressReporter) -> Result<CrawlOutput> {
        if self.config.concurrency == 0 {
            return Err(ScanError::InvalidConcurrency(0));
        }

        let frontier = Arc::new(CrawlFrontier::new(start_url)?.with_max_depth(self.config.max_depth));
        let max_pages = self.config.max_pages;

        info!(
            "Starting crawl of {} (max {} pages, {} workers)",
            start_url, max_pages, self.config.concurrency
        );
        progress.emit(ProgressEvent::CrawlStarted {
            url: start_url.to_string(),
            max_pages,
        });

        let mut output = CrawlOutput::default();
        let mut in_flight: JoinSet<Result<RenderedPage>> = JoinSet::new();
        // Entry of every running task, keyed by task id.
        let mut dispatched: HashMap<Id, FrontierEntry> = HashMap::new();

        loop {
            while in_flight.len() < self.config.concurrency
                && output.pages.len() + in_flight.len() < max_pages
            {
                let Some(entry) = frontier.next_entry() else {
                    break;
                };

                debug!("Dispatching {} at depth {}", entry.url, entry.depth);
                let renderer = self.renderer.clone();
                let frontier = frontier.clone();
                let parent = entry.clone();

                let handle = in_flight.spawn(async move {
                    let rendered = renderer.render(&parent.url).await;

                    // Discover before reporting completion, so the frontier is
                    // never observed empty while this page's links are pending.
                    if let Ok(ref page) = rendered {
                        frontier.offer(&parent, &page.links);
                    }

                    rendered
                });
                dispatched.insert(handle.id(), entry);
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };

            let (id, rendered) = match joined {
                Ok((id, rendered)) => (id, rendered),
                Err(e) => (e.id(), Err(ScanError::JoinError(e))),
            };
            let Some(entry) = dispatched.remove(&id) else {
                warn!("Crawl worker {} finished without a dispatched entry", id);
                continue;
            };

            match rendered {
                Ok(page) => {
                    let record = PageRecord {
                        url: entry.url.clone(),
                        title: page.title,
                        meta_description: page.meta_description,
                        canonical: page.canonical,
                        h1: page.h1,
                        status_code: page.status_code,
                        depth: entry.depth,
                    };

                    output.urls.push(record.url.clone());
                    output.pages.push(record);

                    progress.emit(ProgressEvent::PageVisited {
                        url: entry.url,
                        depth: entry.depth,
                        status_code: page.status_code,
                        recorded: output.pages.len(),
                        max_pages,
                    });
                }
                Err(e) => {
                    let reason = match e {
                        ScanError::Renderer { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    warn!("Failed to load {}: {}", entry.url, reason);
                    progress.emit(ProgressEvent::PageFailed {
                        url: entry.url.clone(),
                        reason: reason.clone(),
                    });
                    output.failures.push(CrawlFailure {
                        url: entry.url,
                        depth: entry.depth,
                        reason,
                    });
                }
            }
        }

        info!(
            "Crawl complete. Recorded {} pages, {} failed, {} URLs discovered, {} left unvisited",
            output.pages.len(),
            output.failures.len(),
            frontier.seen_count(),
            frontier.pending_len()
        );
        progress.emit(ProgressEvent::CrawlFinished {
            recorded: output.pages.len(),
            failed: output.failures.len(),
        });

        Ok(output)
    }
}
