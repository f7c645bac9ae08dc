pub mod config;
pub mod constants;
pub mod events;
pub mod fetch;
pub mod models;
pub mod push;
pub mod reporting;
pub mod runtime;
pub mod stats;
pub mod store;
pub mod sync;
pub mod tracing_setup;

pub use config::{PushConfig, TrackerConfig};
pub use models::{ChangeNotification, FilterKey, FilterState, FetchResponse, Snapshot};
pub use runtime::{TrackerCommand, TrackerHandle, TrackerRuntime};
pub use sync::ViewModel;
