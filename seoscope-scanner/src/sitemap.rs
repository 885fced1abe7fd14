//! Sitemap fetching and crawl/sitemap reconciliation.

use crate::error::{Result, ScanError};
use crate::events::{ProgressEvent, ProgressReporter};
use crate::frontier::normalize_url;
use crate::limiter::ConcurrencyLimiter;
use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_SITEMAP_CONCURRENCY: usize = 4;
/// Hard cap on sitemap documents fetched for one resolution, top level included.
pub const MAX_SITEMAPS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page locations.
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: locations of further sitemaps.
    Index(Vec<String>),
}

/// Parse a sitemap or sitemap index.
///
/// Only `<loc>` elements directly inside `<url>` or `<sitemap>` count, so
/// extension tags such as `<image:loc>` are ignored.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut root: Option<Vec<u8>> = None;
    let mut locs = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            XmlEvent::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if root.is_none() {
                    root = Some(name.clone());
                }
                if name == b"loc" && matches!(stack.last().map(Vec::as_slice), Some(b"url" | b"sitemap")) {
                    current = Some(String::new());
                }
                stack.push(name);
            }
            XmlEvent::Empty(e) => {
                if root.is_none() {
                    root = Some(e.local_name().as_ref().to_vec());
                }
            }
            XmlEvent::Text(t) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&t.unescape()?);
                }
            }
            XmlEvent::CData(c) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            XmlEvent::End(e) => {
                if e.local_name().as_ref() == b"loc"
                    && let Some(loc) = current.take()
                {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
                stack.pop();
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ScanError::ParseError(
            "unexpected end of sitemap document".to_string(),
        ));
    }

    match root.as_deref() {
        Some(b"urlset") => Ok(SitemapDocument::UrlSet(locs)),
        Some(b"sitemapindex") => Ok(SitemapDocument::Index(locs)),
        Some(other) => Err(ScanError::ParseError(format!(
            "expected <urlset> or <sitemapindex>, found <{}>",
            String::from_utf8_lossy(other)
        ))),
        None => Err(ScanError::ParseError("empty sitemap document".to_string())),
    }
}

/// A sitemap inside an index that could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapFetchFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SitemapConfig {
    pub concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_sitemaps: usize,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_SITEMAP_CONCURRENCY,
            timeout: Duration::from_secs(30),
            user_agent: crate::USER_AGENT.to_string(),
            max_sitemaps: MAX_SITEMAPS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SitemapUrls {
    pub urls: BTreeSet<String>,
    pub failures: Vec<SitemapFetchFailure>,
    pub sitemaps_fetched: usize,
}

pub struct SitemapFetcher {
    client: Client,
    limiter: ConcurrencyLimiter,
    max_sitemaps: usize,
}

impl SitemapFetcher {
    pub fn new(config: SitemapConfig) -> Result<Self> {
        let limiter = ConcurrencyLimiter::new(config.concurrency)?;
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            limiter,
            max_sitemaps: config.max_sitemaps,
        })
    }

    /// Resolve `sitemap_url` into the flat set of page URLs it lists.
    ///
    /// Indexes are expanded one level at a time. Every sitemap is fetched
    /// at most once. Failures below the top level are collected in
    /// [`SitemapUrls::failures`]; a top-level failure is returned as `Err`.
    pub async fn fetch_urls(&self, sitemap_url: &str, progress: &ProgressReporter) -> Result<SitemapUrls> {
        info!("Fetching sitemap {}", sitemap_url);

        let mut resolved = SitemapUrls::default();
        let mut processed: HashSet<String> = HashSet::new();
        processed.insert(normalize_url(sitemap_url));

        let top = fetch_document(&self.client, sitemap_url).await?;
        resolved.sitemaps_fetched = 1;

        let mut level = match top {
            SitemapDocument::UrlSet(locs) => {
                progress.emit(ProgressEvent::SitemapFetched {
                    url: sitemap_url.to_string(),
                    entries: locs.len(),
                });
                resolved.urls.extend(absolute_locs(sitemap_url, locs));
                Vec::new()
            }
            SitemapDocument::Index(children) => {
                debug!("{} is an index of {} sitemaps", sitemap_url, children.len());
                absolute_locs(sitemap_url, children)
            }
        };

        while !level.is_empty() {
            let mut batch = Vec::new();
            for child in level.drain(..) {
                if processed.contains(&child) {
                    continue;
                }
                if processed.len() >= self.max_sitemaps {
                    warn!(
                        "Sitemap limit of {} reached, skipping {}",
                        self.max_sitemaps, child
                    );
                    continue;
                }
                processed.insert(child.clone());
                batch.push(child);
            }

            let factories = batch.iter().cloned().map(|url| {
                let client = self.client.clone();
                move || async move { fetch_document(&client, &url).await }
            });
            let slots = self.limiter.run_all(factories).await;

            for (url, slot) in batch.into_iter().zip(slots) {
                match slot.and_then(|fetched| fetched) {
                    Ok(SitemapDocument::UrlSet(locs)) => {
                        resolved.sitemaps_fetched += 1;
                        progress.emit(ProgressEvent::SitemapFetched {
                            url: url.clone(),
                            entries: locs.len(),
                        });
                        resolved.urls.extend(absolute_locs(&url, locs));
                    }
                    Ok(SitemapDocument::Index(children)) => {
                        resolved.sitemaps_fetched += 1;
                        level.extend(absolute_locs(&url, children));
                    }
                    Err(e) => {
                        let reason = match e {
                            ScanError::ResourceFetch { reason, .. }
                            | ScanError::Transport { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        warn!("Failed to fetch sitemap {}: {}", url, reason);
                        progress.emit(ProgressEvent::SitemapFetchFailed {
                            url: url.clone(),
                            reason: reason.clone(),
                        });
                        resolved.failures.push(SitemapFetchFailure { url, reason });
                    }
                }
            }
        }

        info!(
            "Sitemap resolved: {} URLs from {} sitemaps ({} failed)",
            resolved.urls.len(),
            resolved.sitemaps_fetched,
            resolved.failures.len()
        );
        Ok(resolved)
    }
}

async fn fetch_document(client: &Client, url: &str) -> Result<SitemapDocument> {
    debug!("GET {}", url);

    let fetch_error = |reason: String| ScanError::ResourceFetch {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ScanError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP {}", status.as_u16())));
    }

    let body = response.text().await.map_err(|e| fetch_error(e.to_string()))?;
    parse_sitemap(&body)
}

/// Resolve relative locations against the sitemap they came from and
/// normalize them.
fn absolute_locs(base: &str, locs: Vec<String>) -> Vec<String> {
    let base = Url::parse(base).ok();
    locs.into_iter()
        .map(|loc| match (&base, Url::parse(&loc)) {
            (_, Ok(_)) => normalize_url(&loc),
            (Some(base), Err(_)) => base
                .join(&loc)
                .map(|u| normalize_url(u.as_str()))
                .unwrap_or_else(|_| normalize_url(&loc)),
            (None, Err(_)) => normalize_url(&loc),
        })
        .collect()
}

/// Partition of sitemap URLs (A) and crawled URLs (B).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapDiff {
    /// A − B: listed in the sitemap, never reached by crawling.
    pub in_sitemap_only: BTreeSet<String>,
    /// B − A: reached by crawling, absent from the sitemap.
    pub in_crawl_only: BTreeSet<String>,
    pub in_both: BTreeSet<String>,
    pub sitemap_total: usize,
    pub crawled_total: usize,
    /// |A ∩ B| / |A|, 0 when A is empty.
    pub coverage: f64,
}

impl SitemapDiff {
    pub fn coverage_percent(&self) -> String {
        format!("{:.2}%", self.coverage * 100.0)
    }
}

/// Compare the sitemap's URL set with the crawled URL set. Both sides are
/// normalized before comparison.
pub fn reconcile<S, C>(sitemap: S, crawled: C) -> SitemapDiff
where
    S: IntoIterator,
    S::Item: AsRef<str>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let a: BTreeSet<String> = sitemap.into_iter().map(|u| normalize_url(u.as_ref())).collect();
    let b: BTreeSet<String> = crawled.into_iter().map(|u| normalize_url(u.as_ref())).collect();

    let in_both: BTreeSet<String> = a.intersection(&b).cloned().collect();
    let in_sitemap_only: BTreeSet<String> = a.difference(&b).cloned().collect();
    let in_crawl_only: BTreeSet<String> = b.difference(&a).cloned().collect();

    let coverage = if a.is_empty() {
        0.0
    } else {
        in_both.len() as f64 / a.len() as f64
    };

    SitemapDiff {
        in_sitemap_only,
        in_crawl_only,
        in_both,
        sitemap_total: a.len(),
        crawled_total: b.len(),
        coverage,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapDiffSummary {
    pub sitemap_urls: usize,
    pub crawled_urls: usize,
    pub in_both: usize,
    pub orphaned_pages: usize,
    pub missing_pages: usize,
    pub coverage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapDiffReport {
    pub summary: SitemapDiffSummary,
    pub orphaned_pages: Vec<String>,
    pub missing_pages: Vec<String>,
    #[serde(default)]
    pub fetch_failures: Vec<SitemapFetchFailure>,
}

impl SitemapDiffReport {
    pub fn new(diff: &SitemapDiff, fetch_failures: Vec<SitemapFetchFailure>) -> Self {
        Self {
            summary: SitemapDiffSummary {
                sitemap_urls: diff.sitemap_total,
                crawled_urls: diff.crawled_total,
                in_both: diff.in_both.len(),
                orphaned_pages: diff.in_crawl_only.len(),
                missing_pages: diff.in_sitemap_only.len(),
                coverage: diff.coverage_percent(),
            },
            orphaned_pages: diff.in_crawl_only.iter().cloned().collect(),
            missing_pages: diff.in_sitemap_only.iter().cloned().collect(),
            fetch_failures,
        }
    }
}
