//! Push channel reporting backend model changes.

pub mod listener;
pub mod transport;

pub use listener::{ListenerExit, PushListener};
pub use transport::{PushError, PushFrame, PushTransport, RelayTransport};
