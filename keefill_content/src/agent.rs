use crate::auth::{AuthorizationGate, TriggerEvent};
use crate::detector::detect;
use crate::dom::{lock_page, NodeId, PageDom, PageError, SharedPage};
use crate::fill::{fill_credentials, FillOutcome};
use crate::notice::{is_foreign_lock_alert, Notice, NoticeBoard, UserInterface};
use crate::trigger::attach_trigger;
use crossbeam_channel::{Receiver, TryRecvError};
use keefill_protocol::{MessageBus, Notification};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Quiet period after the last relevant mutation before re-scanning.
pub const RESCAN_DEBOUNCE: Duration = Duration::from_millis(100);

/// A batch of DOM changes as reported by the host's mutation observer.
#[derive(Debug, Clone, Default)]
pub struct Mutation {
    pub added: Vec<NodeId>,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn new_marker() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Per-page agent: decorates the login form, gates the trigger, runs fills.
pub struct ContentAgent<D, B, U> {
    page: SharedPage<D>,
    bus: B,
    ui: U,
    marker: String,
    gate: Mutex<AuthorizationGate>,
    notices: Mutex<NoticeBoard>,
    vault_unlocked: Mutex<Option<bool>>,
    inbox: Option<Receiver<Notification>>,
}

impl<D, B, U> ContentAgent<D, B, U>
where
    D: PageDom,
    B: MessageBus,
    U: UserInterface,
{
    pub fn new(page: SharedPage<D>, bus: B, ui: U) -> Self {
        Self {
            page,
            bus,
            ui,
            marker: new_marker(),
            gate: Mutex::new(AuthorizationGate::new()),
            notices: Mutex::new(NoticeBoard::default()),
            vault_unlocked: Mutex::new(None),
            inbox: None,
        }
    }

    /// Subscribes to the background's lock-state broadcasts for this tab.
    pub fn with_inbox(mut self, inbox: Receiver<Notification>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn page(&self) -> &SharedPage<D> {
        &self.page
    }

    /// Finds the login form and decorates its password field. Returns the
    /// trigger when one was added on this pass.
    pub fn scan(&self) -> Result<Option<NodeId>, PageError> {
        let mut dom = lock_page(&self.page)?;
        let Some(password) = detect(&*dom).password else {
            return Ok(None);
        };
        attach_trigger(&mut *dom, password, &self.marker)
    }

    fn rescan(&self) {
        if let Err(e) = self.scan() {
            warn!(error = %e, "rescan failed");
        }
    }

    /// Handles an event on the trigger. Clicks answer with the fill outcome;
    /// a click without a fresh pointer or touch is ignored.
    pub async fn on_trigger_event(&self, event: TriggerEvent) -> Option<FillOutcome> {
        let now = Instant::now();
        match event {
            TriggerEvent::PointerDown(button) => {
                locked(&self.gate).pointer_down(button, now);
                None
            }
            TriggerEvent::TouchStart => {
                locked(&self.gate).touch_start(now);
                None
            }
            TriggerEvent::Click => {
                let Some(capability) = locked(&self.gate).authorize_click(now) else {
                    debug!("unauthorized click on trigger ignored");
                    return None;
                };
                let outcome = fill_credentials(capability, &self.page, &self.bus, &self.ui).await;
                if let Some(notice) = outcome.notice() {
                    self.notify(notice);
                }
                Some(outcome)
            }
        }
    }

    fn notify(&self, notice: Notice) {
        self.ui.notify(&notice);
        locked(&self.notices).show(notice, Instant::now());
    }

    pub fn current_notice(&self) -> Option<Notice> {
        locked(&self.notices).visible(Instant::now()).cloned()
    }

    /// Page `alert()` hook. `false` means the alert is swallowed.
    pub fn allow_alert(&self, message: &str) -> bool {
        if is_foreign_lock_alert(message) {
            debug!(message, "suppressed foreign lock alert");
            return false;
        }
        true
    }

    /// Applies every pending broadcast. Returns how many were read.
    pub fn drain_notifications(&self) -> usize {
        let Some(inbox) = &self.inbox else {
            return 0;
        };
        let mut n = 0;
        loop {
            match inbox.try_recv() {
                Ok(notification) => {
                    n += 1;
                    let unlocked = matches!(notification, Notification::DatabaseUnlocked);
                    *locked(&self.vault_unlocked) = Some(unlocked);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("background inbox closed");
                    break;
                }
            }
        }
        n
    }

    /// Last broadcast lock state, if any arrived. May be stale.
    pub fn cached_unlocked(&self) -> Option<bool> {
        *locked(&self.vault_unlocked)
    }

    fn is_relevant(&self, mutation: &Mutation) -> bool {
        match lock_page(&self.page) {
            Ok(dom) => mutation.added.iter().any(|n| dom.contains_input(*n)),
            Err(_) => false,
        }
    }

    /// Re-scans after bursts of relevant mutations settle. Runs until the
    /// observer side hangs up.
    pub async fn watch(&self, mut mutations: mpsc::Receiver<Mutation>) {
        while let Some(mutation) = mutations.recv().await {
            if !self.is_relevant(&mutation) {
                continue;
            }
            let mut deadline = Instant::now() + RESCAN_DEBOUNCE;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    next = mutations.recv() => match next {
                        Some(m) if self.is_relevant(&m) => {
                            deadline = Instant::now() + RESCAN_DEBOUNCE;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            self.rescan();
        }
        debug!("mutation feed closed");
    }
}
