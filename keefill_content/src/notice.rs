use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const NOTICE_TTL: Duration = Duration::from_secs(4);

const FOREIGN_LOCK_ALERTS: &[&str] = &["Database is locked", "Unlock it from the extension popup"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeColors {
    pub background: &'static str,
    pub border: &'static str,
    pub text: &'static str,
}

impl NoticeKind {
    pub fn colors(self) -> NoticeColors {
        match self {
            NoticeKind::Error => NoticeColors {
                background: "#FFEBEE",
                border: "#C62828",
                text: "#C62828",
            },
            NoticeKind::Success => NoticeColors {
                background: "#E8F5E9",
                border: "#2E7D32",
                text: "#2E7D32",
            },
            NoticeKind::Info => NoticeColors {
                background: "#E3F2FD",
                border: "#2196F3",
                text: "#1565C0",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, text: text.into() }
    }
}

/// What the page host renders: toast-style notices and the entry picker.
pub trait UserInterface: Send + Sync {
    fn notify(&self, notice: &Notice);
    /// Blocking text prompt. `None` when the user cancels.
    fn prompt(&self, message: &str) -> Option<String>;
}

impl<T: UserInterface + ?Sized> UserInterface for Arc<T> {
    fn notify(&self, notice: &Notice) {
        (**self).notify(notice)
    }

    fn prompt(&self, message: &str) -> Option<String> {
        (**self).prompt(message)
    }
}

/// At most one notice on screen; a newer one replaces it.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<(Notice, Instant)>,
}

impl NoticeBoard {
    pub fn show(&mut self, notice: Notice, now: Instant) -> Option<Notice> {
        self.current.replace((notice, now)).map(|(n, _)| n)
    }

    pub fn visible(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|(_, shown)| now.saturating_duration_since(*shown) < NOTICE_TTL)
            .map(|(n, _)| n)
    }
}

/// Lock nags raised by other password-manager extensions on the same page.
pub fn is_foreign_lock_alert(message: &str) -> bool {
    FOREIGN_LOCK_ALERTS.iter().any(|m| message.contains(m))
}
