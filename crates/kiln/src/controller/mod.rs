//! # Controller
//!
//! The foreground half: turns user intent into protocol requests and protocol
//! responses into a [`ControllerState`] that presentation code can render.
//!
//! At most one request is in flight at a time. Asking for a run while one is
//! outstanding is a no-op ([`Dispatch::Busy`]), not an error.

mod handle;
mod input;
mod state;

pub use handle::{Controller, Dispatch};
pub use input::parse_input;
pub use state::{ControllerState, STATUS_COMPLETE, STATUS_INITIALIZING, STATUS_READY, STATUS_RUNNING};
