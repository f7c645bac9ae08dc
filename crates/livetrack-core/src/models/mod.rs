pub mod filter_state;
pub mod notification;
pub mod snapshot;
pub mod tenant;

pub use filter_state::{loosely_equals, FilterKey, FilterState};
pub use notification::{ChangeNotification, ChangeTopic};
pub use snapshot::{Collection, FetchResponse, Snapshot};
pub use tenant::Tenant;
