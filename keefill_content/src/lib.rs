//! Page-side agent: login-form detection, the fill trigger, the user-intent
//! gate and the fill workflow. The DOM is reached through [`PageDom`], so a
//! browser host and the in-memory page share the same code.

pub mod agent;
pub mod auth;
pub mod detector;
pub mod dom;
pub mod fill;
pub mod notice;
pub mod trigger;

pub use agent::{ContentAgent, Mutation, RESCAN_DEBOUNCE};
pub use auth::{AuthorizationGate, FillCapability, PointerButton, TriggerEvent, AUTH_WINDOW};
pub use detector::{detect, LoginFields};
pub use dom::{ElementSpec, MemoryPage, NodeId, PageDom, PageError, SharedPage};
pub use fill::{FillError, FillOutcome, HIGHLIGHT_COLOR};
pub use notice::{Notice, NoticeKind, UserInterface, NOTICE_TTL};
