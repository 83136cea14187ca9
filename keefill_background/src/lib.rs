pub mod badge;
pub mod bus;
pub mod config;
pub mod controller;
pub mod lock_state;
pub mod mock_vault;
pub mod settings;
pub mod tabs;
pub mod vault_client;

use std::sync::Arc;
use tracing::info;

pub use crate::badge::{Badge, BadgeScope, LogIndicator, RecordingIndicator, StatusIndicator};
pub use crate::bus::BusHandle;
pub use crate::config::{ConfigStore, JsonFileStore, MemoryStore, StoredConfig};
pub use crate::controller::StateController;
pub use crate::lock_state::LockState;
pub use crate::settings::Settings;
pub use crate::tabs::{FanOut, TabHub, TabId};
pub use crate::vault_client::{HttpVaultClient, VaultApi, VaultError};

/// A running background context: controller plus its bus.
pub struct Background {
    pub controller: Arc<StateController>,
    pub bus: BusHandle,
}

/// Wires the controller to the real vault and the on-disk config, runs the
/// startup status check, and starts the bus.
pub async fn start(
    settings: &Settings,
    indicator: Arc<dyn StatusIndicator>,
) -> Result<Background, VaultError> {
    let vault = HttpVaultClient::new(settings)?;
    let store = JsonFileStore::new(settings.config_path.clone());
    let controller = Arc::new(StateController::new(
        Arc::new(vault),
        Arc::new(store),
        Arc::new(TabHub::new()),
        indicator,
    ));

    let status = controller.check_status().await;
    info!(
        unlocked = status.is_unlocked,
        reachable = status.backend_reachable,
        vault = %settings.vault_url,
        "background started"
    );

    let bus = bus::spawn(Arc::clone(&controller));
    Ok(Background { controller, bus })
}
