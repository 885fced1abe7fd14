// Console progress: consumes scanner progress events and drives indicatif bars

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use seoscope_scanner::{ProgressEvent, ProgressReporter};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Turns progress events into bar updates. One bar at a time: each stage's
/// start event replaces the previous stage's bar.
pub struct ProgressView {
    bar: Option<ProgressBar>,
    visible: bool,
}

impl ProgressView {
    pub fn new(visible: bool) -> Self {
        Self { bar: None, visible }
    }

    fn replace(&mut self, bar: ProgressBar) -> &ProgressBar {
        if !self.visible {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Some(old) = self.bar.take()
            && !old.is_finished()
        {
            old.finish_and_clear();
        }
        self.bar.insert(bar)
    }

    fn spinner(&mut self, message: String) -> &ProgressBar {
        let needs_spinner = self.bar.as_ref().is_none_or(|b| b.is_finished() || b.length().is_some());
        if needs_spinner {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            self.replace(bar);
        }
        let bar = self.bar.get_or_insert_with(ProgressBar::hidden);
        bar.set_message(message);
        bar.tick();
        bar
    }

    pub fn bar(&self) -> Option<&ProgressBar> {
        self.bar.as_ref()
    }

    pub fn handle(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::CrawlStarted { url, max_pages } => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(spinner_style());
                let bar = self.replace(bar);
                bar.set_message(format!("Crawling {} (up to {} pages)...", url, max_pages));
            }
            ProgressEvent::PageVisited {
                url,
                status_code,
                recorded,
                max_pages,
                ..
            } => {
                self.spinner(format!(
                    "Crawling... {}/{} pages [{}] {}",
                    recorded, max_pages, status_code, url
                ));
            }
            ProgressEvent::PageFailed { url, reason } => {
                if let Some(bar) = &self.bar {
                    bar.println(format!("{} {} - {}", "✗".red(), url, reason));
                }
            }
            ProgressEvent::CrawlFinished { recorded, failed } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(format!(
                        "Crawl complete: {} pages, {} failed",
                        recorded, failed
                    ));
                }
            }
            ProgressEvent::LinkCheckStarted { total } => {
                let bar = ProgressBar::new(total as u64);
                bar.set_style(bar_style());
                self.replace(bar).set_message("checking links");
            }
            ProgressEvent::LinkChecked { url, category, .. } => {
                if let Some(bar) = &self.bar {
                    if category.is_failure() {
                        bar.println(format!("{} {}", "✗".red(), url));
                    }
                    bar.inc(1);
                }
            }
            ProgressEvent::LinkCheckFinished { total } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(format!("{} links checked", total));
                }
            }
            ProgressEvent::SitemapFetched { url, entries } => {
                self.spinner(format!("Sitemap {} ({} URLs)", url, entries));
            }
            ProgressEvent::SitemapFetchFailed { url, reason } => {
                let bar = self.spinner(format!("Sitemap {} failed", url));
                bar.println(format!("{} {} - {}", "✗".red(), url, reason));
            }
            ProgressEvent::AuditStarted { url, index, total } => {
                self.spinner(format!("Auditing [{}/{}] {}", index, total, url));
            }
            ProgressEvent::AuditFinished { url, error } => {
                if let (Some(bar), Some(error)) = (&self.bar, error) {
                    bar.println(format!("{} {} - {}", "✗".red(), url, error));
                }
            }
        }
    }

    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take()
            && !bar.is_finished()
        {
            bar.finish_and_clear();
        }
    }
}

/// Render events until every sender is dropped.
pub fn spawn_progress_renderer(
    mut events: UnboundedReceiver<ProgressEvent>,
    visible: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut view = ProgressView::new(visible);
        while let Some(event) = events.recv().await {
            view.handle(event);
        }
        view.finish();
    })
}

/// The reporter handed to scanner components plus the task rendering it.
pub struct ProgressDisplay {
    reporter: ProgressReporter,
    renderer: Option<JoinHandle<()>>,
}

impl ProgressDisplay {
    /// Progress bars on stderr, or a silent reporter when `show` is false.
    pub fn start(show: bool) -> Self {
        if show {
            let (reporter, events) = ProgressReporter::channel();
            Self {
                reporter,
                renderer: Some(spawn_progress_renderer(events, true)),
            }
        } else {
            Self {
                reporter: ProgressReporter::silent(),
                renderer: None,
            }
        }
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Close the channel and wait for the renderer to drain it.
    pub async fn finish(self) {
        let Self { reporter, renderer } = self;
        drop(reporter);
        if let Some(renderer) = renderer {
            let _ = renderer.await;
        }
    }
}
