use crate::lock_state::LockState;
use crate::tabs::TabId;
use std::sync::Mutex;
use tracing::debug;

pub const UNLOCKED_COLOR: &str = "#4CAF50";
pub const LOCKED_COLOR: &str = "#f44336";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub text: &'static str,
    pub color: &'static str,
}

impl Badge {
    pub fn for_state(state: LockState) -> Self {
        if state.is_unlocked() {
            Badge {
                text: "✓",
                color: UNLOCKED_COLOR,
            }
        } else {
            Badge {
                text: "✗",
                color: LOCKED_COLOR,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeScope {
    Global,
    Tab(TabId),
}

/// Visible lock indicator (toolbar badge in a browser host).
pub trait StatusIndicator: Send + Sync {
    fn show(&self, scope: BadgeScope, badge: Badge);
}

pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn show(&self, scope: BadgeScope, badge: Badge) {
        debug!(?scope, text = badge.text, color = badge.color, "status badge");
    }
}

/// Keeps the last badge per scope; handy for hosts that poll and for tests.
#[derive(Default)]
pub struct RecordingIndicator {
    shown: Mutex<Vec<(BadgeScope, Badge)>>,
}

impl RecordingIndicator {
    pub fn last(&self, scope: BadgeScope) -> Option<Badge> {
        let guard = self.shown.lock().ok()?;
        guard
            .iter()
            .rev()
            .find(|(s, _)| *s == scope)
            .map(|(_, b)| *b)
    }
}

impl StatusIndicator for RecordingIndicator {
    fn show(&self, scope: BadgeScope, badge: Badge) {
        if let Ok(mut guard) = self.shown.lock() {
            guard.push((scope, badge));
        }
    }
}
