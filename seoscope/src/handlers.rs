use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use seoscope_core::audit::{AuditConfig, AuditReport, LighthouseAuditor};
use seoscope_core::pipeline::{
    PipelineOptions, PipelineSummary, SkipStages, UrlSource, execute_audit, execute_crawl,
    execute_link_check, execute_seo, execute_sitemap_diff, load_pages, load_url_file, run_pipeline,
};
use seoscope_core::progress::ProgressDisplay;
use seoscope_core::report::{write_json_report, write_url_list};
use seoscope_core::run::{RunContext, Stage};
use seoscope_core::seo::SeoReport;
use seoscope_scanner::{
    CrawlConfig, CrawlOutput, LinkCheckConfig, LinkCheckReport, SitemapConfig, SitemapDiffReport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

// Input helpers

pub use seoscope_core::pipeline::parse_url_line;

/// Load a URL list the same way `audit --urls` does; an empty list is an
/// error.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>> {
    let urls = load_url_file(path)?;
    if urls.is_empty() {
        bail!("No URLs found in {}", path.display());
    }
    Ok(urls)
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(raw).map(|p| p.into_owned()).unwrap_or_else(|_| raw.to_string()))
}

pub fn output_root(args: &ArgMatches) -> PathBuf {
    let raw = args
        .get_one::<String>("output-dir")
        .map(String::as_str)
        .unwrap_or("./output");
    expand_path(raw)
}

fn input_path(args: &ArgMatches, name: &str) -> Result<PathBuf> {
    let path = args
        .get_one::<PathBuf>(name)
        .with_context(|| format!("<{}> is required", name))?;
    Ok(expand_path(&path.to_string_lossy()))
}

fn required_url<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Url> {
    args.get_one::<Url>(name)
        .with_context(|| format!("<{}> is required", name))
}

fn usize_arg(args: &ArgMatches, name: &str, default: usize) -> usize {
    args.get_one::<usize>(name).copied().unwrap_or(default)
}

/// Write a stage artifact into the run directory and record it.
fn save_stage<T: Serialize>(context: &mut RunContext, stage: Stage, body: &T) -> Result<PathBuf> {
    let path = context.artifact_path(stage);
    write_json_report(body, &path)?;
    context.record(stage, path.clone())?;
    debug!("Saved {:?} artifact to {}", stage, path.display());
    Ok(path)
}

// Console output

pub fn print_banner() {
    println!();
    println!("{}", "  SEOSCOPE".bright_cyan().bold());
    println!(
        "  {}",
        format!("technical SEO audits, v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_heading(title: &str) {
    println!();
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
}

pub fn print_crawl_summary(output: &CrawlOutput) {
    print_heading("CRAWL");
    println!(
        "{} {} pages recorded",
        "✓".green().bold(),
        output.pages.len().to_string().bright_white()
    );
    if !output.failures.is_empty() {
        println!(
            "{} {} pages failed",
            "✗".red().bold(),
            output.failures.len().to_string().bright_white()
        );
        for failure in &output.failures {
            println!("    {} - {}", failure.url, failure.reason.bright_black());
        }
    }
}

pub fn print_link_summary(report: &LinkCheckReport) {
    let summary = &report.summary;
    print_heading("LINK CHECK");
    println!("  Total:     {}", summary.total);
    println!("  OK:        {}", summary.ok.to_string().green());
    println!("  Redirects: {}", summary.redirects.to_string().yellow());
    println!("  Broken:    {}", summary.broken.to_string().red());
    if summary.errors > 0 {
        println!("    of which no response: {}", summary.errors);
    }
    if summary.unknown > 0 {
        println!("  Unknown:   {}", summary.unknown);
    }

    for result in &report.broken {
        let status = match &result.error {
            Some(error) => error.clone(),
            None => result.status.to_string(),
        };
        println!(
            "  {} {} [{}] ({})",
            "✗".red(),
            result.url,
            result.category.as_str(),
            status.bright_black()
        );
    }
}

pub fn print_seo_summary(report: &SeoReport) {
    let stats = &report.stats;
    print_heading("SEO ANALYSIS");
    println!("  Pages analyzed:       {}", stats.total_pages);
    println!(
        "  Pages with issues:    {}",
        stats.pages_with_issues.to_string().yellow()
    );
    println!("  Missing titles:       {}", stats.missing_titles);
    println!("  Missing descriptions: {}", stats.missing_descriptions);
    println!("  Missing H1:           {}", stats.missing_h1);
    println!("  Missing canonical:    {}", stats.missing_canonical);
    println!("  Non-200 status:       {}", stats.non_200_status);
}

pub fn print_audit_summary(report: &AuditReport) {
    let summary = &report.summary;
    print_heading("LIGHTHOUSE");
    println!(
        "  {} audited, {} successful, {} failed",
        summary.total_urls,
        summary.successful.to_string().green(),
        summary.failed.to_string().red()
    );
    if let Some(scores) = &summary.average_scores {
        println!("  Average scores:");
        println!("    Performance:    {:.0}", scores.performance);
        println!("    Accessibility:  {:.0}", scores.accessibility);
        println!("    Best practices: {:.0}", scores.best_practices);
        println!("    SEO:            {:.0}", scores.seo);
    }
}

pub fn print_sitemap_summary(report: &SitemapDiffReport) {
    let summary = &report.summary;
    print_heading("SITEMAP");
    println!("  Sitemap URLs:   {}", summary.sitemap_urls);
    println!("  Crawled URLs:   {}", summary.crawled_urls);
    println!("  In both:        {}", summary.in_both);
    println!(
        "  Orphaned pages: {} (crawled, not in sitemap)",
        summary.orphaned_pages.to_string().yellow()
    );
    println!(
        "  Missing pages:  {} (in sitemap, not reached by the crawl)",
        summary.missing_pages.to_string().yellow()
    );
    println!("  Coverage:       {}", summary.coverage.bright_white().bold());
    if !report.fetch_failures.is_empty() {
        println!(
            "  {} {} sub-sitemaps could not be fetched",
            "⚠".yellow().bold(),
            report.fetch_failures.len()
        );
    }
}

fn print_saved(path: &Path) {
    println!();
    println!(
        "{} Results saved to {}",
        "✓".green().bold(),
        path.display().to_string().bright_white()
    );
}

// Subcommand handlers

pub fn audit_options(args: &ArgMatches) -> Result<PipelineOptions> {
    let target = required_url(args, "URL")?;
    let mut options = PipelineOptions::new(target.as_str());

    options.source = if let Some(path) = args.get_one::<PathBuf>("urls") {
        UrlSource::UrlFile(expand_path(&path.to_string_lossy()))
    } else if let Some(path) = args.get_one::<PathBuf>("manifest") {
        UrlSource::Manifest(expand_path(&path.to_string_lossy()))
    } else if args.get_flag("skip-crawl") {
        bail!("--skip-crawl needs a URL list: pass --urls <FILE> or --manifest <FILE>");
    } else {
        UrlSource::Crawl
    };

    options.crawl.max_pages = usize_arg(args, "max-pages", options.crawl.max_pages);
    options.link_check.concurrency = usize_arg(args, "concurrency", options.link_check.concurrency);
    options.audit.sample_size = usize_arg(args, "sample", options.audit.sample_size);
    options.sitemap_url = args.get_one::<Url>("sitemap").map(|u| u.to_string());
    options.skip = SkipStages {
        links: args.get_flag("skip-links"),
        seo: args.get_flag("skip-seo"),
        lighthouse: args.get_flag("skip-lighthouse"),
        sitemap: args.get_flag("skip-sitemap"),
    };

    Ok(options)
}

pub async fn handle_audit(args: &ArgMatches, quiet: bool) -> Result<()> {
    let options = audit_options(args)?;
    let mut context = RunContext::create(&output_root(args), Some(options.target.as_str()))?;
    let auditor = Arc::new(LighthouseAuditor::new(&options.audit));

    if !quiet {
        println!(
            "{} Run {} for {}",
            "→".cyan().bold(),
            context.run_id().to_string().bright_white(),
            options.target.bright_white()
        );
    }

    let display = ProgressDisplay::start(!quiet);
    let result = run_pipeline(&mut context, options, auditor, display.reporter()).await;
    display.finish().await;

    print_pipeline_summary(&result?);
    print_saved(context.dir());
    Ok(())
}

fn print_pipeline_summary(summary: &PipelineSummary) {
    if let Some(crawl) = &summary.crawl {
        print_crawl_summary(crawl);
    }
    if let Some(links) = &summary.links {
        print_link_summary(links);
    }
    if let Some(seo) = &summary.seo {
        print_seo_summary(seo);
    }
    if let Some(audit) = &summary.audit {
        print_audit_summary(audit);
    }
    if let Some(sitemap) = &summary.sitemap {
        print_sitemap_summary(sitemap);
    }
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let start = required_url(args, "URL")?;
    let defaults = CrawlConfig::default();
    let config = CrawlConfig {
        max_pages: usize_arg(args, "max-pages", defaults.max_pages),
        concurrency: usize_arg(args, "workers", defaults.concurrency),
        max_depth: args.get_one::<usize>("max-depth").copied(),
        ..defaults
    };

    let mut context = RunContext::create(&output_root(args), Some(start.as_str()))?;

    let display = ProgressDisplay::start(!quiet);
    let result = execute_crawl(start.as_str(), config, display.reporter()).await;
    display.finish().await;
    let output = result?;

    save_stage(&mut context, Stage::Crawl, &output)?;
    let urls_path = context.artifact_path(Stage::Urls);
    write_url_list(&output.urls, &urls_path)?;
    context.record(Stage::Urls, urls_path)?;

    print_crawl_summary(&output);
    print_saved(context.dir());
    Ok(())
}

pub async fn handle_check_links(args: &ArgMatches, quiet: bool) -> Result<()> {
    let urls = load_urls_from_file(&input_path(args, "URLS_FILE")?)?;
    let defaults = LinkCheckConfig::default();
    let config = LinkCheckConfig {
        concurrency: usize_arg(args, "concurrency", defaults.concurrency),
        timeout: args
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.timeout),
        ..defaults
    };

    let mut context = RunContext::create(&output_root(args), None)?;

    let display = ProgressDisplay::start(!quiet);
    let result = execute_link_check(urls, config, display.reporter()).await;
    display.finish().await;
    let report = result?;

    let path = save_stage(&mut context, Stage::Links, &report)?;
    print_link_summary(&report);
    print_saved(&path);
    Ok(())
}

pub fn handle_seo(args: &ArgMatches) -> Result<()> {
    let pages = load_pages(&input_path(args, "PAGES_FILE")?)?;
    let report = execute_seo(&pages);

    let mut context = RunContext::create(&output_root(args), None)?;
    let path = save_stage(&mut context, Stage::Seo, &report)?;

    print_seo_summary(&report);
    print_saved(&path);
    Ok(())
}

pub async fn handle_lighthouse(args: &ArgMatches, quiet: bool) -> Result<()> {
    let urls = load_urls_from_file(&input_path(args, "URLS_FILE")?)?;
    let defaults = AuditConfig::default();
    let config = AuditConfig {
        sample_size: usize_arg(args, "sample", defaults.sample_size),
        ..defaults
    };
    let auditor = Arc::new(LighthouseAuditor::new(&config));

    let mut context = RunContext::create(&output_root(args), None)?;

    let display = ProgressDisplay::start(!quiet);
    let result = execute_audit(&urls, auditor, &config, display.reporter()).await;
    display.finish().await;
    let report = result?;

    let path = save_stage(&mut context, Stage::Audit, &report)?;
    print_audit_summary(&report);
    print_saved(&path);
    Ok(())
}

pub async fn handle_sitemap_diff(args: &ArgMatches, quiet: bool) -> Result<()> {
    let sitemap_url = required_url(args, "SITEMAP_URL")?;
    let crawled = load_urls_from_file(&input_path(args, "URLS_FILE")?)?;

    let mut context = RunContext::create(&output_root(args), Some(sitemap_url.as_str()))?;

    let display = ProgressDisplay::start(!quiet);
    let result = execute_sitemap_diff(
        sitemap_url.as_str(),
        &crawled,
        SitemapConfig::default(),
        display.reporter(),
    )
    .await;
    display.finish().await;
    let report = result?;

    let path = save_stage(&mut context, Stage::Sitemap, &report)?;
    print_sitemap_summary(&report);
    print_saved(&path);
    Ok(())
}
