// Page-quality audits: the auditor seam, the Lighthouse CLI auditor and the
// sequential audit batch

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use seoscope_scanner::{ConcurrencyLimiter, ProgressEvent, ProgressReporter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Page audits are expensive and share one browser; they never overlap.
pub const AUDIT_CONCURRENCY: usize = 1;
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub performance: f64,
    pub accessibility: f64,
    pub best_practices: f64,
    pub seo: f64,
}

/// Raw metric values as reported by the auditor (milliseconds, except CLS).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub fcp: Option<f64>,
    pub lcp: Option<f64>,
    pub tbt: Option<f64>,
    pub cls: Option<f64>,
    pub si: Option<f64>,
}

/// Pass/fail of the individual SEO-relevant audits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoAudits {
    pub meta_description: bool,
    pub viewport: bool,
    pub document_title: bool,
    pub http_status_code: bool,
    pub link_text: bool,
    pub crawlable: bool,
    pub robots: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditScores {
    pub scores: CategoryScores,
    pub metrics: AuditMetrics,
    pub audits: SeoAudits,
}

#[async_trait]
pub trait PageAuditor: Send + Sync {
    async fn audit(&self, url: &str) -> Result<AuditScores>;
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub sample_size: usize,
    /// Lighthouse executable, looked up on `PATH` unless absolute.
    pub binary: String,
    pub timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            binary: "lighthouse".to_string(),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Runs the `lighthouse` CLI against headless Chrome, one process per URL.
pub struct LighthouseAuditor {
    binary: String,
    timeout: Duration,
}

impl LighthouseAuditor {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl PageAuditor for LighthouseAuditor {
    async fn audit(&self, url: &str) -> Result<AuditScores> {
        debug!("Running {} against {}", self.binary, url);

        let mut command = Command::new(&self.binary);
        command
            .arg(url)
            .arg("--output=json")
            .arg("--output-path=stdout")
            .arg("--quiet")
            .arg("--only-categories=performance,accessibility,best-practices,seo")
            .arg("--chrome-flags=--headless")
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| anyhow!("audit timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("Failed to run {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.lines().last().unwrap_or("").trim()
            );
        }

        let report: Value =
            serde_json::from_slice(&output.stdout).context("Lighthouse output is not JSON")?;
        parse_lighthouse_report(&report)
    }
}

/// Pull scores, metrics and audit outcomes out of a Lighthouse result.
///
/// Category scores are scaled to 0-100. A missing category is an error;
/// missing metrics stay `None` and missing audits count as failed.
pub fn parse_lighthouse_report(report: &Value) -> Result<AuditScores> {
    if let Some(error) = report.pointer("/runtimeError/message").and_then(Value::as_str) {
        bail!("Lighthouse runtime error: {}", error);
    }

    let category = |id: &str| -> Result<f64> {
        report
            .pointer(&format!("/categories/{}/score", id))
            .and_then(Value::as_f64)
            .map(|score| score * 100.0)
            .ok_or_else(|| anyhow!("Lighthouse report has no {} score", id))
    };

    let metric = |id: &str| {
        report
            .pointer(&format!("/audits/{}/numericValue", id))
            .and_then(Value::as_f64)
    };

    let passed = |id: &str| {
        report
            .pointer(&format!("/audits/{}/score", id))
            .and_then(Value::as_f64)
            == Some(1.0)
    };

    Ok(AuditScores {
        scores: CategoryScores {
            performance: category("performance")?,
            accessibility: category("accessibility")?,
            best_practices: category("best-practices")?,
            seo: category("seo")?,
        },
        metrics: AuditMetrics {
            fcp: metric("first-contentful-paint"),
            lcp: metric("largest-contentful-paint"),
            tbt: metric("total-blocking-time"),
            cls: metric("cumulative-layout-shift"),
            si: metric("speed-index"),
        },
        audits: SeoAudits {
            meta_description: passed("meta-description"),
            viewport: passed("viewport"),
            document_title: passed("document-title"),
            http_status_code: passed("http-status-code"),
            link_text: passed("link-text"),
            crawlable: passed("is-crawlable"),
            robots: passed("robots-txt"),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub url: String,
    pub timestamp: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AuditScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total_urls: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_scores: Option<CategoryScores>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReport {
    pub summary: AuditSummary,
    pub results: Vec<AuditResult>,
}

impl AuditReport {
    pub fn from_results(results: Vec<AuditResult>) -> Self {
        let scores: Vec<&CategoryScores> = results
            .iter()
            .filter_map(|r| r.outcome.as_ref().map(|o| &o.scores))
            .collect();

        let average_scores = if scores.is_empty() {
            None
        } else {
            let n = scores.len() as f64;
            Some(CategoryScores {
                performance: scores.iter().map(|s| s.performance).sum::<f64>() / n,
                accessibility: scores.iter().map(|s| s.accessibility).sum::<f64>() / n,
                best_practices: scores.iter().map(|s| s.best_practices).sum::<f64>() / n,
                seo: scores.iter().map(|s| s.seo).sum::<f64>() / n,
            })
        };

        let successful = scores.len();
        Self {
            summary: AuditSummary {
                total_urls: results.len(),
                successful,
                failed: results.len() - successful,
                average_scores,
            },
            results,
        }
    }
}

/// Audits the first `sample_size` URLs of a list, strictly one at a time.
pub struct AuditBatch {
    auditor: Arc<dyn PageAuditor>,
    limiter: ConcurrencyLimiter,
    sample_size: usize,
}

impl AuditBatch {
    pub fn new(auditor: Arc<dyn PageAuditor>, sample_size: usize) -> Result<Self> {
        Ok(Self {
            auditor,
            limiter: ConcurrencyLimiter::new(AUDIT_CONCURRENCY)?,
            sample_size,
        })
    }

    pub async fn run(&self, urls: &[String], progress: &ProgressReporter) -> AuditReport {
        let sample: Vec<String> = urls.iter().take(self.sample_size).cloned().collect();
        let total = sample.len();
        info!("Auditing {} of {} URLs", total, urls.len());

        let factories = sample.iter().cloned().enumerate().map(|(index, url)| {
            let auditor = self.auditor.clone();
            let progress = progress.clone();
            move || async move {
                progress.emit(ProgressEvent::AuditStarted {
                    url: url.clone(),
                    index: index + 1,
                    total,
                });

                let outcome = auditor.audit(&url).await;
                let error = outcome.as_ref().err().map(|e| format!("{:#}", e));
                if let Some(ref error) = error {
                    warn!("Audit of {} failed: {}", url, error);
                }

                progress.emit(ProgressEvent::AuditFinished {
                    url: url.clone(),
                    error: error.clone(),
                });

                AuditResult {
                    url,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    outcome: outcome.ok(),
                    error,
                }
            }
        });

        let results = self
            .limiter
            .run_all(factories)
            .await
            .into_iter()
            .zip(sample)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|e| AuditResult {
                    url,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    outcome: None,
                    error: Some(format!("audit task failed: {}", e)),
                })
            })
            .collect();

        AuditReport::from_results(results)
    }
}
