use crate::classify::ProbeOutcome;
use crate::error::Result;
use crate::events::{ProgressEvent, ProgressReporter};
use crate::limiter::ConcurrencyLimiter;
use crate::result::{CheckResult, LinkCheckReport};
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_LINK_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct LinkCheckConfig {
    pub concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_LINK_CONCURRENCY,
            timeout: Duration::from_secs(10),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }
}

/// Split a newline-delimited URL list, dropping blank lines.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

pub struct LinkChecker {
    client: Client,
    limiter: ConcurrencyLimiter,
}

impl LinkChecker {
    pub fn new(config: LinkCheckConfig) -> Result<Self> {
        let limiter = ConcurrencyLimiter::new(config.concurrency)?;

        // HEAD only, and redirects are evidence: never follow them.
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, limiter })
    }

    /// Probe every URL and fold the outcomes into a report.
    ///
    /// Results are attributed by input position, so the order in which
    /// probes finish has no effect on the report.
    pub async fn check_all(&self, urls: Vec<String>, progress: &ProgressReporter) -> LinkCheckReport {
        let total = urls.len();
        info!("Checking {} links with concurrency {}", total, self.limiter.limit());
        progress.emit(ProgressEvent::LinkCheckStarted { total });

        let done = Arc::new(AtomicUsize::new(0));

        let factories = urls.iter().cloned().map(|url| {
            let client = self.client.clone();
            let progress = progress.clone();
            let done = done.clone();
            move || async move {
                let outcome = probe(&client, &url).await;
                let result = CheckResult::from_outcome(url, outcome);
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.emit(ProgressEvent::LinkChecked {
                    url: result.url.clone(),
                    status: result.status,
                    category: result.category,
                    done: finished,
                    total,
                });
                result
            }
        });

        let slots = self.limiter.run_all(factories).await;

        let results: Vec<CheckResult> = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| match slot {
                Ok(result) => result,
                Err(e) => CheckResult::from_outcome(
                    url,
                    ProbeOutcome::Transport(format!("check task failed: {}", e)),
                ),
            })
            .collect();

        progress.emit(ProgressEvent::LinkCheckFinished { total });
        LinkCheckReport::from_results(results)
    }
}

/// Issue one HEAD request. Any status code is an outcome, not an error.
pub async fn probe(client: &Client, url: &str) -> ProbeOutcome {
    debug!("HEAD {}", url);

    match client.head(url).send().await {
        Ok(response) => {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            ProbeOutcome::Response {
                status: response.status().as_u16(),
                location,
            }
        }
        Err(e) => ProbeOutcome::Transport(describe_transport_error(&e)),
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("Request timed out: {}", error)
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else if error.is_builder() {
        format!("Invalid request: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LinkCategory;
    use crate::error::ScanError;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn checker(concurrency: usize) -> LinkChecker {
        LinkChecker::new(LinkCheckConfig {
            concurrency,
            timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_url_list_drops_blank_lines() {
        let urls = parse_url_list("https://a.com/\n\n   \nhttps://a.com/missing\n");
        assert_eq!(urls, vec!["https://a.com/", "https://a.com/missing"]);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result = LinkChecker::new(LinkCheckConfig {
            concurrency: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(ScanError::InvalidConcurrency(0))));
    }

    #[tokio::test]
    async fn test_ok_and_broken() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let list = format!("{0}/\n\n{0}/missing\n", mock_server.uri());
        let urls = parse_url_list(&list);
        let report = checker(10).check_all(urls, &ProgressReporter::silent()).await;

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.ok, 1);
        assert_eq!(report.summary.broken, 1);
        assert_eq!(report.broken.len(), 1);
        assert_eq!(report.broken[0].url, format!("{}/missing", mock_server.uri()));
        assert_eq!(report.broken[0].status, 404);
    }

    #[tokio::test]
    async fn test_redirect_is_recorded_not_followed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/new"),
            )
            .mount(&mock_server)
            .await;

        // Would turn the redirect into an ok if it were followed.
        Mock::given(method("HEAD"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let urls = vec![format!("{}/old", mock_server.uri())];
        let report = checker(2).check_all(urls, &ProgressReporter::silent()).await;

        assert_eq!(report.summary.redirects, 1);
        assert_eq!(report.redirects[0].status, 301);
        assert_eq!(report.redirects[0].redirect_target.as_deref(), Some("/new"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_result() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        Mock::given(method("HEAD"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let urls = vec![
            format!("{}/slow", mock_server.uri()),
            format!("{}/fast", mock_server.uri()),
        ];
        let report = checker(2).check_all(urls, &ProgressReporter::silent()).await;

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.ok, 1);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.broken[0].category, LinkCategory::Error);
        assert_eq!(report.broken[0].status, 0);
        assert!(report.broken[0].error.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error() {
        // Nothing listens on port 9 of the loopback interface.
        let urls = vec!["http://127.0.0.1:9/".to_string()];
        let report = checker(1).check_all(urls, &ProgressReporter::silent()).await;

        assert_eq!(report.summary.broken, 1);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.broken[0].category, LinkCategory::Error);
    }

    #[tokio::test]
    async fn test_progress_reports_every_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let urls: Vec<String> = (0..5)
            .map(|i| format!("{}/page{}", mock_server.uri(), i))
            .collect();
        let (reporter, mut rx) = ProgressReporter::channel();
        let report = checker(3).check_all(urls, &reporter).await;
        drop(reporter);

        let mut checked = 0;
        let mut last_done = 0;
        while let Some(event) = rx.recv().await {
            if let ProgressEvent::LinkChecked { done, total, .. } = event {
                checked += 1;
                assert_eq!(total, 5);
                last_done = last_done.max(done);
            }
        }

        assert_eq!(report.summary.ok, 5);
        assert_eq!(checked, 5);
        assert_eq!(last_done, 5);
    }
}
