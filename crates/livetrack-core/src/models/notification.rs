use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::push_events;

/// A push notification naming the backend model that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub model_name: String,
}

impl ChangeNotification {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }

    /// Extract the notification from an event payload.
    /// Returns `None` when `model_name` is missing, blank or not a string.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let model_name = payload.get("model_name")?.as_str()?.trim();
        if model_name.is_empty() {
            return None;
        }
        Some(Self::new(model_name))
    }
}

/// The change topics bound on the push channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeTopic {
    Ticket,
    Order,
    Support,
    Meal,
}

impl ChangeTopic {
    pub const ALL: [ChangeTopic; 4] = [Self::Ticket, Self::Order, Self::Support, Self::Meal];

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Ticket => push_events::TICKET_CHANGES,
            Self::Order => push_events::ORDER_CHANGES,
            Self::Support => push_events::SUPPORT_CHANGES,
            Self::Meal => push_events::MEAL_CHANGES,
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.event_name() == name)
    }
}
