pub mod classify;
pub mod crawler;
pub mod error;
pub mod events;
pub mod frontier;
pub mod limiter;
pub mod link_checker;
pub mod renderer;
pub mod result;
pub mod sitemap;

pub use classify::{LinkCategory, ProbeOutcome, classify, classify_status};
pub use crawler::{CrawlConfig, Crawler};
pub use error::ScanError;
pub use events::{ProgressEvent, ProgressReporter};
pub use frontier::{CrawlFrontier, FrontierEntry, normalize_url};
pub use limiter::ConcurrencyLimiter;
pub use link_checker::{LinkCheckConfig, LinkChecker, parse_url_list};
pub use renderer::{HttpRenderer, PageRenderer, RenderedPage};
pub use result::{CheckResult, CrawlFailure, CrawlOutput, LinkCheckReport, LinkCheckSummary, PageRecord};
pub use sitemap::{
    SitemapConfig, SitemapDiff, SitemapDiffReport, SitemapFetchFailure, SitemapFetcher,
    SitemapUrls, reconcile,
};

pub const USER_AGENT: &str = concat!("seoscope/", env!("CARGO_PKG_VERSION"));
