use crate::models::ChangeNotification;

/// Outcome of observing one change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedChange {
    pub model_name: String,
    /// Same model as the immediately previous notification.
    pub repeated: bool,
}

/// Remembers the last model name reported by the push channel.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last_model: Option<String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, notification: ChangeNotification) -> ObservedChange {
        let repeated = self.last_model.as_deref() == Some(notification.model_name.as_str());
        self.last_model = Some(notification.model_name.clone());
        ObservedChange {
            model_name: notification.model_name,
            repeated,
        }
    }

    pub fn last_model(&self) -> Option<&str> {
        self.last_model.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_model = None;
    }
}
