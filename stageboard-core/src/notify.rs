/// User-facing feedback for persistence results.
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Where the engine sends toasts. Called only from the synchronizer.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NoticeKind, title: &str, detail: Option<&str>);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, kind: NoticeKind, title: &str, detail: Option<&str>) {
        let detail = detail.unwrap_or("");
        match kind {
            NoticeKind::Success => log::info!("[stageboard.notice] {} {}", title, detail),
            NoticeKind::Error => log::error!("[stageboard.notice] {} {}", title, detail),
        }
    }
}

/// Fans notices out to any number of subscribers (UI layers, tests).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<Notice>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Notice>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, kind: NoticeKind, title: &str, detail: Option<&str>) {
        let notice = Notice {
            kind,
            title: title.to_string(),
            detail: detail.map(str::to_string),
        };
        if self.tx.send(notice).is_err() {
            log::debug!("[stageboard.notice.send] No subscribers for {:?} notice", kind);
        }
    }
}
