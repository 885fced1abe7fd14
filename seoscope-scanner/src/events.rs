//! Progress events emitted by the scanner components.
//!
//! Components never print. They push [`ProgressEvent`]s into a channel and
//! whoever owns the receiving end decides how to render them.

use crate::classify::LinkCategory;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    CrawlStarted {
        url: String,
        max_pages: usize,
    },
    PageVisited {
        url: String,
        depth: usize,
        status_code: u16,
        recorded: usize,
        max_pages: usize,
    },
    PageFailed {
        url: String,
        reason: String,
    },
    CrawlFinished {
        recorded: usize,
        failed: usize,
    },
    LinkCheckStarted {
        total: usize,
    },
    LinkChecked {
        url: String,
        status: u16,
        category: LinkCategory,
        done: usize,
        total: usize,
    },
    LinkCheckFinished {
        total: usize,
    },
    SitemapFetched {
        url: String,
        entries: usize,
    },
    SitemapFetchFailed {
        url: String,
        reason: String,
    },
    AuditStarted {
        url: String,
        index: usize,
        total: usize,
    },
    AuditFinished {
        url: String,
        error: Option<String>,
    },
}

/// Sending half of the progress channel.
///
/// Cheap to clone. A reporter created with [`ProgressReporter::silent`]
/// drops every event, and a closed receiver is not an error: progress is
/// advisory and never affects results.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_receiver_in_order() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.emit(ProgressEvent::LinkCheckStarted { total: 2 });
        reporter.emit(ProgressEvent::LinkCheckFinished { total: 2 });
        drop(reporter);

        assert_eq!(rx.recv().await, Some(ProgressEvent::LinkCheckStarted { total: 2 }));
        assert_eq!(rx.recv().await, Some(ProgressEvent::LinkCheckFinished { total: 2 }));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_ignored() {
        let (reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.emit(ProgressEvent::CrawlFinished { recorded: 0, failed: 0 });
        ProgressReporter::silent().emit(ProgressEvent::CrawlFinished { recorded: 0, failed: 0 });
    }
}
