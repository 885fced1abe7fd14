use crate::classify::{LinkCategory, ProbeOutcome, classify};
use serde::{Deserialize, Serialize};

/// On-page data for one successfully visited page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub canonical: String,
    #[serde(default)]
    pub h1: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub depth: usize,
}

impl PageRecord {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            title: String::new(),
            meta_description: String::new(),
            canonical: String::new(),
            h1: String::new(),
            status_code: 0,
            depth,
        }
    }
}

/// A page the renderer could not load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlFailure {
    pub url: String,
    pub depth: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutput {
    /// URLs of recorded pages, in completion order.
    pub urls: Vec<String>,
    pub pages: Vec<PageRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CrawlFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub url: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub category: LinkCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn from_outcome(url: String, outcome: ProbeOutcome) -> Self {
        let category = classify(&outcome);
        match outcome {
            ProbeOutcome::Response { status, location } => Self {
                url,
                status,
                category,
                redirect_target: if category == LinkCategory::Redirect {
                    location
                } else {
                    None
                },
                error: None,
            },
            ProbeOutcome::Transport(reason) => Self {
                url,
                status: 0,
                category,
                redirect_target: None,
                error: Some(reason),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkCheckSummary {
    pub total: usize,
    pub ok: usize,
    pub redirects: usize,
    /// Broken responses plus transport errors.
    pub broken: usize,
    /// How many of `broken` never got a response.
    pub errors: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkCheckReport {
    pub summary: LinkCheckSummary,
    pub broken: Vec<CheckResult>,
    pub redirects: Vec<CheckResult>,
}

impl LinkCheckReport {
    /// Fold per-URL results (in input order) into a report.
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let mut report = LinkCheckReport {
            summary: LinkCheckSummary {
                total: results.len(),
                ..Default::default()
            },
            ..Default::default()
        };

        for result in results {
            match result.category {
                LinkCategory::Ok => report.summary.ok += 1,
                LinkCategory::Unknown => report.summary.unknown += 1,
                LinkCategory::Redirect => {
                    report.summary.redirects += 1;
                    report.redirects.push(result);
                }
                LinkCategory::Broken | LinkCategory::Error => {
                    report.summary.broken += 1;
                    if result.category == LinkCategory::Error {
                        report.summary.errors += 1;
                    }
                    report.broken.push(result);
                }
            }
        }

        report
    }
}
