use crate::badge::{Badge, BadgeScope, StatusIndicator};
use crate::config::{ConfigStore, StoredConfig};
use crate::lock_state::{LockState, LockTracker, Seq};
use crate::tabs::TabHub;
use crate::vault_client::{UnlockRequest, VaultApi, VaultError};
use keefill_protocol::{
    AckReply, ConfigReply, CredentialsReply, EntriesReply, ErrorCode, Notification, Request,
    Response, Secret, StatusReply,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const MISSING_INPUT: &str = "Database path and password are required";
const UNREACHABLE: &str = "Cannot connect to the vault service. Make sure it is running.";
const SEARCH_FAILED: &str = "Database locked or backend error";
const RETRIEVAL_FAILED: &str = "Failed to get credentials";

/// Owner of lock state and the stored vault path; the only caller of the vault.
pub struct StateController {
    vault: Arc<dyn VaultApi>,
    store: Arc<dyn ConfigStore>,
    tabs: Arc<TabHub>,
    indicator: Arc<dyn StatusIndicator>,
    lock: Mutex<LockTracker>,
    config: Mutex<StoredConfig>,
}

impl StateController {
    pub fn new(
        vault: Arc<dyn VaultApi>,
        store: Arc<dyn ConfigStore>,
        tabs: Arc<TabHub>,
        indicator: Arc<dyn StatusIndicator>,
    ) -> Self {
        let config = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "stored config unreadable, starting empty");
            StoredConfig::default()
        });
        Self {
            vault,
            store,
            tabs,
            indicator,
            lock: Mutex::new(LockTracker::default()),
            config: Mutex::new(config),
        }
    }

    pub fn tabs(&self) -> &Arc<TabHub> {
        &self.tabs
    }

    pub fn lock_state(&self) -> LockState {
        self.tracker().state()
    }

    pub fn stored_db_path(&self) -> String {
        self.stored().db_path.clone()
    }

    /// Routing table for the message bus. Every arm resolves to a response.
    pub async fn handle(&self, request: Request) -> Response {
        debug!(action = request.action(), "bus request");
        match request {
            Request::CheckStatus => Response::Status(self.check_status().await),
            Request::Unlock {
                db_path,
                password,
                keyfile,
            } => Response::Ack(self.unlock(db_path, password, keyfile).await),
            Request::Lock => Response::Ack(self.lock().await),
            Request::SearchEntries { url } => Response::Entries(self.search_entries(&url).await),
            Request::GetCredentials { uuid } => {
                Response::Credentials(self.get_credentials(&uuid).await)
            }
            Request::GetConfig => Response::Config(ConfigReply {
                db_path: self.stored_db_path(),
            }),
            Request::SetDbPath { db_path } => Response::Ack(self.set_db_path(&db_path)),
        }
    }

    pub async fn check_status(&self) -> StatusReply {
        let seq = self.begin();
        let next = match self.vault.status().await {
            Ok(status) => LockState::reachable(status.locked),
            Err(e) => {
                warn!(error = %e, "vault status check failed");
                LockState::unreachable()
            }
        };
        self.apply(seq, next);
        self.refresh_badge();

        let state = self.lock_state();
        StatusReply {
            is_unlocked: state.is_unlocked(),
            backend_reachable: state.backend_reachable(),
        }
    }

    pub async fn unlock(
        &self,
        db_path: Option<String>,
        password: Secret,
        keyfile: Option<String>,
    ) -> AckReply {
        let db_path = db_path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.stored_db_path());
        if db_path.is_empty() || password.is_empty() {
            return AckReply::failure(ErrorCode::InvalidInput, MISSING_INPUT);
        }

        let req = UnlockRequest {
            db_path,
            password,
            keyfile: keyfile.filter(|k| !k.trim().is_empty()),
        };

        let seq = self.begin();
        match self.vault.unlock(&req).await {
            Ok(ack) if ack.success => {
                if self.apply(seq, LockState::reachable(false)) {
                    self.refresh_badge();
                    let fan_out = self.tabs.broadcast(Notification::DatabaseUnlocked);
                    debug!(?fan_out, "unlock broadcast");
                }
                // A failed save is logged; the unlock itself already happened.
                let _ = self.persist_db_path(&req.db_path);
                info!(db_path = %req.db_path, "vault unlocked");
                AckReply::ok()
            }
            Ok(ack) => {
                let msg = ack.error.unwrap_or_else(|| "Unlock failed".to_string());
                AckReply::failure(ErrorCode::Rejected, msg)
            }
            Err(e) => self.failed_call("unlock", seq, e),
        }
    }

    pub async fn lock(&self) -> AckReply {
        let seq = self.begin();
        match self.vault.lock().await {
            Ok(ack) if ack.success => {
                if self.apply(seq, LockState::reachable(true)) {
                    self.refresh_badge();
                    let fan_out = self.tabs.broadcast(Notification::DatabaseLocked);
                    debug!(?fan_out, "lock broadcast");
                }
                info!("vault locked");
                AckReply::ok()
            }
            Ok(ack) => {
                let msg = ack.error.unwrap_or_else(|| "Lock failed".to_string());
                AckReply::failure(ErrorCode::Rejected, msg)
            }
            Err(e) => self.failed_call("lock", seq, e),
        }
    }

    pub async fn search_entries(&self, url: &str) -> EntriesReply {
        let seq = self.begin();
        match self.vault.search(url).await {
            Ok(entries) => {
                debug!(count = entries.len(), "search entries");
                EntriesReply::found(entries)
            }
            Err(e) if e.is_transport() => {
                let ack = self.failed_call("search", seq, e);
                EntriesReply::failure(ErrorCode::TransportUnavailable, ack.error.unwrap_or_default())
            }
            Err(e) => {
                debug!(error = %e, "search refused");
                EntriesReply::failure(ErrorCode::Rejected, SEARCH_FAILED)
            }
        }
    }

    pub async fn get_credentials(&self, uuid: &str) -> CredentialsReply {
        let seq = self.begin();
        match self.vault.get_credentials(uuid).await {
            Ok(credential) => CredentialsReply::found(credential),
            Err(e) if e.is_transport() => {
                let ack = self.failed_call("get-credentials", seq, e);
                CredentialsReply::failure(
                    ErrorCode::TransportUnavailable,
                    ack.error.unwrap_or_default(),
                )
            }
            Err(e) => {
                debug!(error = %e, "credential retrieval refused");
                CredentialsReply::failure(ErrorCode::RetrievalFailed, RETRIEVAL_FAILED)
            }
        }
    }

    /// Explicit user edit of the stored path. Empty is allowed here and only here.
    pub fn set_db_path(&self, db_path: &str) -> AckReply {
        match self.persist_db_path(db_path.trim()) {
            Ok(()) => AckReply::ok(),
            Err(msg) => AckReply::failure(ErrorCode::Internal, msg),
        }
    }

    fn persist_db_path(&self, db_path: &str) -> Result<(), String> {
        let snapshot = {
            let mut config = self.stored();
            config.db_path = db_path.to_string();
            config.clone()
        };
        self.store.save(&snapshot).map_err(|e| {
            warn!(error = %e, "failed to persist db path");
            e.to_string()
        })
    }

    fn failed_call(&self, op: &'static str, seq: Seq, e: VaultError) -> AckReply {
        if e.is_transport() {
            warn!(op, error = %e, "vault unreachable");
            if self.apply(seq, LockState::unreachable()) {
                self.refresh_badge();
            }
            AckReply::failure(ErrorCode::TransportUnavailable, UNREACHABLE)
        } else {
            warn!(op, error = %e, "vault call failed");
            AckReply::failure(ErrorCode::Rejected, e.to_string())
        }
    }

    fn refresh_badge(&self) {
        let badge = Badge::for_state(self.lock_state());
        self.indicator.show(BadgeScope::Global, badge);
        for tab in self.tabs.open_tabs() {
            self.indicator.show(BadgeScope::Tab(tab), badge);
        }
    }

    fn begin(&self) -> Seq {
        self.tracker().begin()
    }

    fn apply(&self, seq: Seq, next: LockState) -> bool {
        let applied = self.tracker().apply(seq, next);
        if !applied {
            debug!(?seq, "stale outcome ignored");
        }
        applied
    }

    fn tracker(&self) -> MutexGuard<'_, LockTracker> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stored(&self) -> MutexGuard<'_, StoredConfig> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}
