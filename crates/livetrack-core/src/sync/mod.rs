//! Debounced refetching and view state.

pub mod changes;
pub mod engine;
pub mod gate;
pub mod view_state;

pub use changes::{ChangeTracker, ObservedChange};
pub use engine::{FetchTicket, FilterUpdate, Settlement, SyncEngine};
pub use gate::{DebounceGate, GateDecision, PendingFetch, RefetchTrigger};
pub use view_state::{ViewModel, ViewPhase, ViewStateController};
