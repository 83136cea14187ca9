use std::time::Duration;
use tokio::time::Instant;

/// How long a pointer-down or touch-start keeps the trigger armed.
pub const AUTH_WINDOW: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Auxiliary,
    Secondary,
    Other(u16),
}

impl From<u16> for PointerButton {
    fn from(code: u16) -> Self {
        match code {
            0 => PointerButton::Primary,
            1 => PointerButton::Auxiliary,
            2 => PointerButton::Secondary,
            n => PointerButton::Other(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    PointerDown(PointerButton),
    TouchStart,
    Click,
}

/// Proof that a click followed a real pointer or touch. Only the gate mints
/// one, and the fill workflow takes it by value.
#[derive(Debug)]
pub struct FillCapability {
    _private: (),
}

#[derive(Debug, Default)]
pub struct AuthorizationGate {
    armed_at: Option<Instant>,
}

impl AuthorizationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer_down(&mut self, button: PointerButton, now: Instant) {
        if button == PointerButton::Primary {
            self.armed_at = Some(now);
        }
    }

    pub fn touch_start(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    /// Consumes the arming. `None` for synthetic clicks and for clicks that
    /// arrive after the window closed.
    pub fn authorize_click(&mut self, now: Instant) -> Option<FillCapability> {
        let armed_at = self.armed_at.take()?;
        let fresh = now.saturating_duration_since(armed_at) < AUTH_WINDOW;
        fresh.then_some(FillCapability { _private: () })
    }
}
