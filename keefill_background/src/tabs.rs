use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use keefill_protocol::Notification;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub type TabId = u32;

pub const TAB_INBOX_CAP: usize = 16;

/// Result of one fan-out. The broadcast itself never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Open tabs, each with an optional content-agent inbox.
#[derive(Default)]
pub struct TabHub {
    tabs: Mutex<BTreeMap<TabId, Option<Sender<Notification>>>>,
}

impl TabHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, tab: TabId) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.entry(tab).or_insert(None);
        }
    }

    pub fn close(&self, tab: TabId) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.remove(&tab);
        }
    }

    /// Registers a content agent for `tab` (opening it if needed). A previous
    /// agent in the same tab stops receiving.
    pub fn attach(&self, tab: TabId) -> Receiver<Notification> {
        let (tx, rx) = bounded(TAB_INBOX_CAP);
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.insert(tab, Some(tx));
        }
        rx
    }

    pub fn open_tabs(&self) -> Vec<TabId> {
        self.tabs
            .lock()
            .map(|tabs| tabs.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn broadcast(&self, notification: Notification) -> FanOut {
        let mut report = FanOut::default();
        let Ok(mut tabs) = self.tabs.lock() else {
            return report;
        };
        for slot in tabs.values_mut() {
            let Some(tx) = slot.as_ref() else {
                report.dropped += 1;
                continue;
            };
            match tx.try_send(notification) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => report.dropped += 1,
                Err(TrySendError::Disconnected(_)) => {
                    report.dropped += 1;
                    *slot = None;
                }
            }
        }
        report
    }
}
