//! Transient user-facing notices (toasts).
//!
//! The library decides *when* a notice is due; a [`NoticeSink`] decides how
//! it reaches the user.

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// How long an alert for an incoming ALERT/REMINDER stays visible.
pub const ALERT_DURATION: Duration = Duration::from_secs(5);

/// Default lifetime of action notices.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Alert,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: None,
            duration: DEFAULT_DURATION,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title)
    }

    /// An incoming high-attention notification.
    pub fn alert(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Alert, title)
            .with_description(description)
            .with_duration(ALERT_DURATION)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Destination for notices.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: Notice) {
        let description = notice.description.as_deref().unwrap_or_default();
        match notice.level {
            NoticeLevel::Error => error!(title = %notice.title, description, "notice"),
            NoticeLevel::Alert => warn!(title = %notice.title, description, "notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                info!(title = %notice.title, description, "notice")
            }
        }
    }
}

/// Fans notices out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNoticeSink {
    tx: broadcast::Sender<Notice>,
}

impl BroadcastNoticeSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNoticeSink {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NoticeSink for BroadcastNoticeSink {
    fn notify(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}
