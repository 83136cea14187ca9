use async_trait::async_trait;
use keefill_background::mock_vault::{self, MockVault, DEMO_DB_PATH, DEMO_PASSWORD};
use keefill_background::{bus, HttpVaultClient, LogIndicator, MemoryStore, StateController, TabHub};
use keefill_popup::{Connection, MessageKind, PopupController, PopupView};
use keefill_protocol::{
    AckReply, BusError, ConfigReply, ErrorCode, MessageBus, Request, Response, Secret, StatusReply,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

/// Scripted bus: answers from fixed replies and records what it was asked.
struct ScriptedBus {
    status: Option<StatusReply>,
    unlock: AckReply,
    stored_path: String,
    seen: Mutex<Vec<Request>>,
}

impl ScriptedBus {
    fn reachable(unlocked: bool) -> Self {
        Self {
            status: Some(StatusReply {
                is_unlocked: unlocked,
                backend_reachable: true,
            }),
            unlock: AckReply::ok(),
            stored_path: "/saved.kdbx".to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn actions(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().iter().map(|r| r.action()).collect()
    }
}

#[async_trait]
impl MessageBus for ScriptedBus {
    async fn request(&self, request: Request) -> Result<Response, BusError> {
        self.seen.lock().unwrap().push(request.clone());
        match request {
            Request::CheckStatus => self.status.map(Response::Status).ok_or(BusError::Disconnected),
            Request::GetConfig => Ok(Response::Config(ConfigReply {
                db_path: self.stored_path.clone(),
            })),
            Request::Unlock { .. } => Ok(Response::Ack(self.unlock.clone())),
            _ => Ok(Response::Ack(AckReply::ok())),
        }
    }
}

#[tokio::test]
async fn opens_locked_with_stored_path() {
    let bus = Arc::new(ScriptedBus::reachable(false));
    let popup = PopupController::open(bus.clone()).await;
    assert_eq!(
        popup.view(),
        &PopupView::Locked {
            db_path: "/saved.kdbx".to_string()
        }
    );
    assert!(matches!(popup.connection(), Connection::Connected { .. }));
    assert_eq!(bus.actions(), vec!["getConfig", "checkStatus"]);
}

#[tokio::test]
async fn dead_bus_shows_setup() {
    let bus = ScriptedBus {
        status: None,
        ..ScriptedBus::reachable(false)
    };
    let popup = PopupController::open(bus).await;
    assert_eq!(popup.view(), &PopupView::Disconnected);
    assert_eq!(popup.connection(), Connection::NotRunning);
}

#[tokio::test]
async fn unlock_validates_path_then_password() {
    let bus = Arc::new(ScriptedBus {
        stored_path: String::new(),
        ..ScriptedBus::reachable(false)
    });
    let mut popup = PopupController::open(bus.clone()).await;

    assert!(!popup.submit_unlock().await);
    assert_eq!(
        popup.message(Instant::now()).map(|m| m.text.as_str()),
        Some("Please enter database path")
    );

    popup.edit_db_path("  /vault.kdbx  ").await.unwrap();
    assert_eq!(popup.db_path(), "/vault.kdbx");
    assert!(!popup.submit_unlock().await);
    assert_eq!(
        popup.message(Instant::now()).map(|m| m.text.as_str()),
        Some("Please enter master password")
    );
    assert!(!bus.actions().contains(&"unlock"));
    assert!(bus
        .seen
        .lock()
        .unwrap()
        .iter()
        .any(|r| matches!(r, Request::SetDbPath { db_path } if db_path == "/vault.kdbx")));
}

#[tokio::test(start_paused = true)]
async fn successful_unlock_clears_password() {
    let bus = Arc::new(ScriptedBus::reachable(false));
    let mut popup = PopupController::open(bus.clone()).await;
    popup.set_password(Secret::new("hunter2"));

    assert!(popup.submit_unlock().await);
    assert_eq!(popup.view(), &PopupView::Unlocked);
    assert!(popup.password_is_empty());
    let shown = popup.message(Instant::now()).map(|m| m.kind);
    assert_eq!(shown, Some(MessageKind::Success));

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(popup.message(Instant::now()).is_none());
}

#[tokio::test]
async fn refused_unlock_reports_vault_error() {
    let bus = ScriptedBus {
        unlock: AckReply::failure(ErrorCode::Rejected, "Invalid credentials"),
        ..ScriptedBus::reachable(false)
    };
    let mut popup = PopupController::open(bus).await;
    popup.set_password(Secret::new("wrong"));

    assert!(!popup.submit_unlock().await);
    let message = popup.message(Instant::now()).unwrap();
    assert_eq!(message.kind, MessageKind::Error);
    assert_eq!(message.text, "Failed: Invalid credentials");
    assert!(!popup.password_is_empty());
}

#[tokio::test]
async fn popup_drives_real_background() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(mock_vault::serve(
        listener,
        Arc::new(Mutex::new(MockVault::demo())),
    ));

    let controller = Arc::new(StateController::new(
        Arc::new(HttpVaultClient::with_base_url(&base).unwrap()),
        Arc::new(MemoryStore::default()),
        Arc::new(TabHub::new()),
        Arc::new(LogIndicator),
    ));
    let mut popup = PopupController::open(bus::spawn(controller)).await;
    assert_eq!(
        popup.view(),
        &PopupView::Locked {
            db_path: String::new()
        }
    );

    popup.edit_db_path(DEMO_DB_PATH).await.unwrap();
    popup.set_password(Secret::new(DEMO_PASSWORD));
    assert!(popup.submit_unlock().await);
    assert_eq!(popup.check_connection().await, &PopupView::Unlocked);

    assert!(popup.submit_lock().await);
    assert_eq!(
        popup.check_connection().await,
        &PopupView::Locked {
            db_path: DEMO_DB_PATH.to_string()
        }
    );
}
