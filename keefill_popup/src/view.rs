use std::time::Duration;
use tokio::time::Instant;

/// Success messages hide themselves; errors stay until replaced.
pub const SUCCESS_MESSAGE_TTL: Duration = Duration::from_secs(5);
/// The connection banner disappears this long after a successful check.
pub const CONNECTED_BANNER_TTL: Duration = Duration::from_secs(3);

pub const SETUP_INSTRUCTIONS: &str = "Backend not running. Start the local vault service \
(https://localhost:5000) and press \"Check connection\".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupView {
    /// Vault service unreachable: only setup instructions are shown.
    Disconnected,
    Locked { db_path: String },
    Unlocked,
}

impl PopupView {
    pub fn title(&self) -> &'static str {
        match self {
            PopupView::Disconnected => "Backend Not Connected",
            PopupView::Locked { .. } => "Database Locked",
            PopupView::Unlocked => "Database Unlocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupMessage {
    pub kind: MessageKind,
    pub text: String,
    shown_at: Instant,
}

impl PopupMessage {
    pub fn new(kind: MessageKind, text: impl Into<String>, now: Instant) -> Self {
        Self {
            kind,
            text: text.into(),
            shown_at: now,
        }
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        match self.kind {
            MessageKind::Error => true,
            MessageKind::Success => now.saturating_duration_since(self.shown_at) < SUCCESS_MESSAGE_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Checking,
    Connected { since: Instant },
    NotRunning,
}

impl Connection {
    /// Banner text, or `None` once a successful check has faded out.
    pub fn banner(&self, now: Instant) -> Option<&'static str> {
        match self {
            Connection::Checking => Some("Checking connection..."),
            Connection::Connected { since } => {
                let fresh = now.saturating_duration_since(*since) < CONNECTED_BANNER_TTL;
                fresh.then_some("Backend connected successfully!")
            }
            Connection::NotRunning => Some("Backend not running. Please start the vault service."),
        }
    }
}

/// Enter never submits a popup form; only explicit button presses do.
pub fn suppresses_key(key: &str) -> bool {
    key == "Enter"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_fades_error_stays() {
        let t0 = Instant::now();
        let ok = PopupMessage::new(MessageKind::Success, "done", t0);
        let err = PopupMessage::new(MessageKind::Error, "nope", t0);
        let later = t0 + SUCCESS_MESSAGE_TTL;
        assert!(ok.is_visible(t0));
        assert!(!ok.is_visible(later));
        assert!(err.is_visible(later));
    }

    #[test]
    fn connected_banner_fades() {
        let t0 = Instant::now();
        let c = Connection::Connected { since: t0 };
        assert!(c.banner(t0).is_some());
        assert!(c.banner(t0 + CONNECTED_BANNER_TTL).is_none());
        assert!(Connection::NotRunning.banner(t0 + CONNECTED_BANNER_TTL).is_some());
    }

    #[test]
    fn only_enter_is_suppressed() {
        assert!(suppresses_key("Enter"));
        assert!(!suppresses_key("Tab"));
    }
}
