use std::sync::Arc;

use crate::sync::ViewModel;

/// Notifications broadcast by the tracker runtime.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    ViewChanged(Arc<ViewModel>),
    /// A fetch failed; the previous view stays displayed
    FetchFailed { message: String },
    ModelChanged { model_name: String },
}
