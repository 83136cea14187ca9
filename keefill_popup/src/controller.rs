use crate::view::{Connection, MessageKind, PopupMessage, PopupView};
use keefill_protocol::{AckReply, BusError, MessageBus, Request, Secret};
use tokio::time::Instant;
use tracing::{debug, warn};

/// State behind the popup: form contents, current view, last message.
pub struct PopupController<B> {
    bus: B,
    view: PopupView,
    connection: Connection,
    db_path: String,
    password: Secret,
    keyfile: String,
    message: Option<PopupMessage>,
}

impl<B: MessageBus> PopupController<B> {
    /// Loads the stored path and checks the vault, like opening the popup.
    pub async fn open(bus: B) -> Self {
        let mut popup = Self {
            bus,
            view: PopupView::Disconnected,
            connection: Connection::Checking,
            db_path: String::new(),
            password: Secret::default(),
            keyfile: String::new(),
            message: None,
        };
        match popup.bus.request(Request::GetConfig).await {
            Ok(response) => popup.db_path = response.into_config().db_path,
            Err(e) => warn!(error = %e, "could not load stored database path"),
        }
        popup.check_connection().await;
        popup
    }

    pub fn view(&self) -> &PopupView {
        &self.view
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn password_is_empty(&self) -> bool {
        self.password.is_empty()
    }

    pub fn message(&self, now: Instant) -> Option<&PopupMessage> {
        self.message.as_ref().filter(|m| m.is_visible(now))
    }

    pub async fn check_connection(&mut self) -> &PopupView {
        self.connection = Connection::Checking;
        let status = match self.bus.request(Request::CheckStatus).await {
            Ok(response) => Some(response.into_status()),
            Err(e) => {
                warn!(error = %e, "status check failed");
                None
            }
        };
        match status {
            Some(s) if s.backend_reachable => {
                self.connection = Connection::Connected { since: Instant::now() };
                self.render(s.is_unlocked);
            }
            _ => {
                self.connection = Connection::NotRunning;
                self.view = PopupView::Disconnected;
            }
        }
        &self.view
    }

    fn render(&mut self, unlocked: bool) {
        self.view = if unlocked {
            PopupView::Unlocked
        } else {
            PopupView::Locked {
                db_path: self.db_path.clone(),
            }
        };
    }

    /// Path field changed: keep the trimmed value and persist it.
    pub async fn edit_db_path(&mut self, raw: &str) -> Result<(), BusError> {
        self.db_path = raw.trim().to_string();
        if let PopupView::Locked { db_path } = &mut self.view {
            db_path.clone_from(&self.db_path);
        }
        let ack = self
            .bus
            .request(Request::SetDbPath {
                db_path: self.db_path.clone(),
            })
            .await?
            .into_ack();
        if !ack.success {
            debug!(error = ?ack.error, "database path not saved");
        }
        Ok(())
    }

    pub fn set_password(&mut self, password: Secret) {
        self.password = password;
    }

    pub fn set_keyfile(&mut self, keyfile: &str) {
        self.keyfile = keyfile.trim().to_string();
    }

    fn say(&mut self, kind: MessageKind, text: impl Into<String>) {
        self.message = Some(PopupMessage::new(kind, text, Instant::now()));
    }

    /// Returns true when the vault reports the database unlocked.
    pub async fn submit_unlock(&mut self) -> bool {
        if self.db_path.trim().is_empty() {
            self.say(MessageKind::Error, "Please enter database path");
            return false;
        }
        if self.password.is_empty() {
            self.say(MessageKind::Error, "Please enter master password");
            return false;
        }
        self.message = None;

        let request = Request::Unlock {
            db_path: Some(self.db_path.trim().to_string()),
            password: self.password.clone(),
            keyfile: Some(self.keyfile.clone()).filter(|k| !k.is_empty()),
        };
        match self.bus.request(request).await.map(|r| r.into_ack()) {
            Ok(AckReply { success: true, .. }) => {
                self.password = Secret::default();
                self.say(MessageKind::Success, "Database unlocked successfully!");
                self.render(true);
                true
            }
            Ok(ack) => {
                let reason = ack.error.unwrap_or_else(|| "Unknown error".to_string());
                self.say(MessageKind::Error, format!("Failed: {reason}"));
                false
            }
            Err(e) => {
                self.say(MessageKind::Error, format!("Error: {e}"));
                false
            }
        }
    }

    /// Returns true when the vault reports the database locked.
    pub async fn submit_lock(&mut self) -> bool {
        match self.bus.request(Request::Lock).await.map(|r| r.into_ack()) {
            Ok(AckReply { success: true, .. }) => {
                self.say(MessageKind::Success, "Database locked successfully");
                self.render(false);
                true
            }
            Ok(_) => {
                self.say(MessageKind::Error, "Failed to lock database");
                false
            }
            Err(e) => {
                self.say(MessageKind::Error, format!("Error: {e}"));
                false
            }
        }
    }
}
