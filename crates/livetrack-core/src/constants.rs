//! Application-wide constants
//!
//! Centralized location for collection names, endpoint defaults and timing
//! values shared by the sync engine, the push listener and the CLI.

/// Default statistics API base URL
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Statistics resource polled for sectors and locations
pub const DEFAULT_RESOURCE: &str = "refada-statistics";

/// Value sent in the `Accept-Language` header
pub const DEFAULT_LANGUAGE: &str = "ar";

/// Quiet period of the fetch gate
pub const DEBOUNCE_WINDOW_MS: u64 = 500;

/// Default address of the line-delimited push relay
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:6001";

/// Reconnect attempts after a transport disconnect before giving up
pub const PUSH_MAX_RETRIES: u32 = 3;

/// Fixed delay between reconnect attempts
pub const PUSH_RETRY_BACKOFF_MS: u64 = 3000;

// Snapshot collections with dedicated filtering rules
pub mod collections {
    /// Primary sector collection, filtered on every optional filter
    pub const SECTORS_TABLE: &str = "sectors_table";
    /// Mentor action locations, exempt from nationality/boss/supervisor filters
    pub const LOCATIONS: &str = "locations";
}

// Push channel event names
pub mod push_events {
    pub const TICKET_CHANGES: &str = "Ticket-changes";
    pub const ORDER_CHANGES: &str = "Order-changes";
    pub const SUPPORT_CHANGES: &str = "Support-changes";
    pub const MEAL_CHANGES: &str = "Meal-changes";

    // Pusher protocol events
    pub const CONNECT: &str = "pusher:connect";
    pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
    pub const SUBSCRIBE: &str = "pusher:subscribe";
    pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";
    pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher:subscription_succeeded";
    pub const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";
    pub const ERROR: &str = "pusher:error";
    pub const PING: &str = "pusher:ping";
    pub const PONG: &str = "pusher:pong";

    /// Pusher protocol version announced on connect
    pub const PROTOCOL_VERSION: u32 = 7;
}

// Environment variables read by `TrackerConfig::apply_env`
pub mod env {
    pub const API_BASE_URL: &str = "LIVETRACK_API_BASE_URL";
    pub const RESOURCE: &str = "LIVETRACK_RESOURCE";
    pub const LANGUAGE: &str = "LIVETRACK_LANGUAGE";
    pub const TENANT: &str = "LIVETRACK_TENANT";
    pub const ERROR_WEBHOOK: &str = "LIVETRACK_ERROR_WEBHOOK";
    pub const LOG_FILE: &str = "LIVETRACK_LOG_FILE";
    pub const PUSHER_APP_KEY: &str = "PUSHER_APP_KEY";
    pub const PUSHER_APP_CLUSTER: &str = "PUSHER_APP_CLUSTER";
    pub const PUSHER_APP_CHANNEL: &str = "PUSHER_APP_CHANNEL";
    pub const PUSHER_RELAY_ADDR: &str = "PUSHER_RELAY_ADDR";
}
