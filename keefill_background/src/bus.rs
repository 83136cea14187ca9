use crate::controller::StateController;
use async_trait::async_trait;
use keefill_protocol::{parse_request, BusError, MessageBus, Request, Response};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub const BUS_CAP: usize = 64;

pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// Sender side of the bus, cloned into every popup and page context.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<Envelope>,
}

pub fn spawn(controller: Arc<StateController>) -> BusHandle {
    let (tx, rx) = mpsc::channel(BUS_CAP);
    tokio::spawn(run(rx, controller));
    BusHandle { tx }
}

/// Requests are handled as they arrive, each on its own task; nothing is
/// serialized against anything else.
pub async fn run(mut rx: mpsc::Receiver<Envelope>, controller: Arc<StateController>) {
    while let Some(Envelope { request, reply }) = rx.recv().await {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            let action = request.action();
            let response = controller.handle(request).await;
            if reply.send(response).is_err() {
                debug!(action, "requester went away before the reply");
            }
        });
    }
    debug!("bus closed");
}

impl BusHandle {
    /// Entry point for untyped senders. Always returns a JSON response body.
    pub async fn request_json(&self, raw: &str) -> String {
        let response = match parse_request(raw) {
            Ok(request) => self.request(request).await.unwrap_or_else(|e| {
                warn!(error = %e, "bus request failed");
                Response::Ack(keefill_protocol::AckReply::failure(
                    keefill_protocol::ErrorCode::Internal,
                    e.to_string(),
                ))
            }),
            Err(e) => {
                debug!(error = %e, "rejected bus message");
                Response::invalid_request(&e)
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"success":false,"error":"internal error","code":"internal"}"#.to_string()
        })
    }
}

#[async_trait]
impl MessageBus for BusHandle {
    async fn request(&self, request: Request) -> Result<Response, BusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| BusError::Disconnected)?;
        rx.await.map_err(|_| BusError::NoReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::LogIndicator;
    use crate::config::MemoryStore;
    use crate::tabs::TabHub;
    use crate::vault_client::HttpVaultClient;
    use serde_json::Value;

    fn offline_bus() -> BusHandle {
        // Port 9 (discard) on loopback: nothing answers.
        let vault = HttpVaultClient::with_base_url("http://127.0.0.1:9").unwrap();
        let controller = StateController::new(
            Arc::new(vault),
            Arc::new(MemoryStore::default()),
            Arc::new(TabHub::new()),
            Arc::new(LogIndicator),
        );
        spawn(Arc::new(controller))
    }

    #[tokio::test]
    async fn malformed_messages_get_invalid_request() {
        let bus = offline_bus();
        for raw in ["{}", "null", "{\"action\":42}", "{\"action\":\"explode\"}"] {
            let v: Value = serde_json::from_str(&bus.request_json(raw).await).unwrap();
            assert_eq!(v["success"], Value::Bool(false), "{raw}");
            assert_eq!(v["code"], Value::from("invalid_request"), "{raw}");
        }
    }

    #[tokio::test]
    async fn unlock_without_password_is_invalid_input() {
        let bus = offline_bus();
        let raw = bus
            .request_json(r#"{"action":"unlock","dbPath":"/vault.kdbx"}"#)
            .await;
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["code"], Value::from("invalid_input"));
    }

    #[tokio::test]
    async fn dropped_controller_reports_disconnected() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let bus = BusHandle { tx };
        assert!(matches!(
            bus.request(Request::Lock).await,
            Err(BusError::Disconnected)
        ));
    }
}
