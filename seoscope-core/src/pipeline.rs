// Stage execution and the full audit pipeline

use crate::audit::{AuditBatch, AuditConfig, AuditReport, PageAuditor};
use crate::report::{load_json, write_json_report, write_url_list};
use crate::run::{RunContext, RunManifest, Stage};
use crate::seo::{SeoReport, analyze_pages};
use anyhow::{Context, Result, bail};
use seoscope_scanner::{
    CrawlConfig, CrawlOutput, Crawler, LinkCheckConfig, LinkCheckReport, LinkChecker, PageRecord,
    ProgressReporter, SitemapConfig, SitemapDiffReport, SitemapFetcher, parse_url_list, reconcile,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

pub async fn execute_crawl(
    start_url: &str,
    config: CrawlConfig,
    progress: &ProgressReporter,
) -> Result<CrawlOutput> {
    let crawler = Crawler::new(config).context("Failed to set up crawler")?;
    crawler
        .crawl(start_url, progress)
        .await
        .with_context(|| format!("Crawl of {} failed", start_url))
}

pub async fn execute_link_check(
    urls: Vec<String>,
    config: LinkCheckConfig,
    progress: &ProgressReporter,
) -> Result<LinkCheckReport> {
    let checker = LinkChecker::new(config).context("Failed to set up link checker")?;
    Ok(checker.check_all(urls, progress).await)
}

pub fn execute_seo(pages: &[PageRecord]) -> SeoReport {
    analyze_pages(pages)
}

pub async fn execute_audit(
    urls: &[String],
    auditor: Arc<dyn PageAuditor>,
    config: &AuditConfig,
    progress: &ProgressReporter,
) -> Result<AuditReport> {
    let batch = AuditBatch::new(auditor, config.sample_size)?;
    Ok(batch.run(urls, progress).await)
}

/// Fetch the sitemap and compare it with `crawled`. Sub-sitemap failures
/// end up in the report; a top-level failure is an error.
pub async fn execute_sitemap_diff(
    sitemap_url: &str,
    crawled: &[String],
    config: SitemapConfig,
    progress: &ProgressReporter,
) -> Result<SitemapDiffReport> {
    let fetcher = SitemapFetcher::new(config).context("Failed to set up sitemap fetcher")?;
    let sitemap = fetcher
        .fetch_urls(sitemap_url, progress)
        .await
        .with_context(|| format!("Failed to load sitemap {}", sitemap_url))?;

    let diff = reconcile(&sitemap.urls, crawled);
    Ok(SitemapDiffReport::new(&diff, sitemap.failures))
}

/// Read a newline-delimited URL list. Blank lines are skipped and every
/// other line goes through [`parse_url_line`]. A missing file is an error.
pub fn load_url_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;
    Ok(parse_url_list(&content)
        .into_iter()
        .map(|line| parse_url_line(&line))
        .collect())
}

/// Parse a single line as a URL, adding https:// when the scheme is missing.
/// Lines that still don't parse are kept so the link check reports them.
pub fn parse_url_line(line: &str) -> String {
    if Url::parse(line).is_ok() {
        return line.to_string();
    }

    let with_scheme = format!("https://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return with_scheme;
    }

    warn!("'{}' is not a valid URL", line);
    line.to_string()
}

/// Read a page-record collection: either a bare JSON array or a crawl
/// artifact with a `pages` field.
pub fn load_pages(path: &Path) -> Result<Vec<PageRecord>> {
    let value: serde_json::Value = load_json(path)?;
    let pages = match value {
        serde_json::Value::Object(mut map) => map
            .remove("pages")
            .with_context(|| format!("{} has no pages", path.display()))?,
        other => other,
    };
    serde_json::from_value(pages)
        .with_context(|| format!("{} is not a page collection", path.display()))
}

/// Where the pipeline gets its URL list from.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlSource {
    Crawl,
    UrlFile(PathBuf),
    /// Reuse the URL list (and page records, if any) of an earlier run.
    Manifest(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipStages {
    pub links: bool,
    pub seo: bool,
    pub lighthouse: bool,
    pub sitemap: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target: String,
    pub source: UrlSource,
    pub crawl: CrawlConfig,
    pub link_check: LinkCheckConfig,
    pub audit: AuditConfig,
    pub sitemap: SitemapConfig,
    pub sitemap_url: Option<String>,
    pub skip: SkipStages,
}

impl PipelineOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: UrlSource::Crawl,
            crawl: CrawlConfig::default(),
            link_check: LinkCheckConfig::default(),
            audit: AuditConfig::default(),
            sitemap: SitemapConfig::default(),
            sitemap_url: None,
            skip: SkipStages::default(),
        }
    }
}

/// What each stage produced, for the console summary.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub crawl: Option<CrawlOutput>,
    pub url_count: usize,
    pub links: Option<LinkCheckReport>,
    pub seo: Option<SeoReport>,
    pub audit: Option<AuditReport>,
    pub sitemap: Option<SitemapDiffReport>,
}

/// Run every enabled stage in order, writing each artifact into the run
/// directory and recording it in the manifest as soon as it exists.
pub async fn run_pipeline(
    context: &mut RunContext,
    options: PipelineOptions,
    auditor: Arc<dyn PageAuditor>,
    progress: &ProgressReporter,
) -> Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();

    let (urls, pages) = match &options.source {
        UrlSource::Crawl => {
            info!("Stage: crawl");
            let output = execute_crawl(&options.target, options.crawl.clone(), progress).await?;

            let crawl_path = context.artifact_path(Stage::Crawl);
            write_json_report(&output, &crawl_path)?;
            context.record(Stage::Crawl, crawl_path)?;

            let urls = output.urls.clone();
            let pages = output.pages.clone();
            summary.crawl = Some(output);
            (urls, Some(pages))
        }
        UrlSource::UrlFile(path) => (load_url_file(path)?, None),
        UrlSource::Manifest(path) => {
            let previous = RunManifest::load(path)?;
            let urls_path = previous
                .artifact(Stage::Urls)
                .with_context(|| format!("{} records no URL list", path.display()))?;
            let urls = load_url_file(urls_path)?;
            let pages = match previous.artifact(Stage::Crawl) {
                Some(crawl_path) => Some(load_pages(crawl_path)?),
                None => None,
            };
            (urls, pages)
        }
    };

    if urls.is_empty() {
        if options.source != UrlSource::Crawl {
            bail!("No URLs to audit");
        }
        warn!(
            "Crawl of {} recorded no pages; continuing with an empty URL list",
            options.target
        );
    }
    summary.url_count = urls.len();

    let urls_path = context.artifact_path(Stage::Urls);
    write_url_list(&urls, &urls_path)?;
    context.record(Stage::Urls, urls_path)?;

    if !options.skip.links {
        info!("Stage: link check");
        let report = execute_link_check(urls.clone(), options.link_check.clone(), progress).await?;
        let path = context.artifact_path(Stage::Links);
        write_json_report(&report, &path)?;
        context.record(Stage::Links, path)?;
        summary.links = Some(report);
    }

    if !options.skip.seo
        && let Some(pages) = &pages
    {
        info!("Stage: SEO analysis");
        let report = execute_seo(pages);
        let path = context.artifact_path(Stage::Seo);
        write_json_report(&report, &path)?;
        context.record(Stage::Seo, path)?;
        summary.seo = Some(report);
    }

    if !options.skip.lighthouse {
        info!("Stage: page audits");
        let report = execute_audit(&urls, auditor, &options.audit, progress).await?;
        let path = context.artifact_path(Stage::Audit);
        write_json_report(&report, &path)?;
        context.record(Stage::Audit, path)?;
        summary.audit = Some(report);
    }

    if !options.skip.sitemap
        && let Some(sitemap_url) = &options.sitemap_url
    {
        info!("Stage: sitemap diff");
        let report =
            execute_sitemap_diff(sitemap_url, &urls, options.sitemap.clone(), progress).await?;
        let path = context.artifact_path(Stage::Sitemap);
        write_json_report(&report, &path)?;
        context.record(Stage::Sitemap, path)?;
        summary.sitemap = Some(report);
    }

    Ok(summary)
}
