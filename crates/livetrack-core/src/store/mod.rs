pub mod filter;
pub mod layers;
pub mod merge;
pub mod options;
pub mod snapshot_store;

pub use filter::{compute_view, FilterStats};
pub use layers::{derive_layers, DisplayMode, MapLayers, Site};
pub use merge::{merge, MergeOutcome, MergeRule};
pub use options::{filter_options, stale_selections, OptionField};
pub use snapshot_store::{ApplyOutcome, SnapshotStore};
