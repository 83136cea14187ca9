//! Popup side of the extension: connection check, unlock form, lock button.

pub mod controller;
pub mod view;

pub use controller::PopupController;
pub use view::{suppresses_key, Connection, MessageKind, PopupMessage, PopupView, SETUP_INSTRUCTIONS};
