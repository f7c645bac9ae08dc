use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{self, env};
use crate::models::{FilterState, Tenant};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Tracker settings: file values, then environment overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    pub api_base_url: String,
    pub resource: String,
    /// Sent as `Accept-Language`
    pub language: String,
    pub debounce_ms: u64,
    /// Tenant profile used to preselect the organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Chat webhook receiving fetch error reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_webhook: Option<String>,
    pub push: PushConfig,
    /// Filter form state to start with
    pub filters: FilterState,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            resource: constants::DEFAULT_RESOURCE.to_string(),
            language: constants::DEFAULT_LANGUAGE.to_string(),
            debounce_ms: constants::DEBOUNCE_WINDOW_MS,
            tenant: None,
            error_webhook: None,
            push: PushConfig::default(),
            filters: FilterState::default(),
        }
    }
}

impl TrackerConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = get(env::API_BASE_URL) {
            self.api_base_url = value;
        }
        if let Some(value) = get(env::RESOURCE) {
            self.resource = value;
        }
        if let Some(value) = get(env::LANGUAGE) {
            self.language = value;
        }
        if let Some(value) = get(env::TENANT) {
            if Tenant::from_profile(&value).is_none() {
                return Err(ConfigError::InvalidValue {
                    name: env::TENANT,
                    value,
                });
            }
            self.tenant = Some(value);
        }
        if let Some(value) = get(env::ERROR_WEBHOOK) {
            self.error_webhook = Some(value);
        }
        if let Some(value) = get(env::PUSHER_APP_KEY) {
            self.push.app_key = Some(value);
        }
        if let Some(value) = get(env::PUSHER_APP_CLUSTER) {
            self.push.cluster = Some(value);
        }
        if let Some(value) = get(env::PUSHER_APP_CHANNEL) {
            self.push.channel = Some(value);
        }
        if let Some(value) = get(env::PUSHER_RELAY_ADDR) {
            self.push.relay_addr = value;
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tenant(&self) -> Option<Tenant> {
        self.tenant.as_deref().and_then(Tenant::from_profile)
    }

    /// Initial filters with the tenant's organization filled in when none
    /// was selected.
    pub fn initial_filters(&self) -> FilterState {
        let mut filters = self.filters.clone();
        if !filters.has_organization() {
            if let Some(tenant) = self.tenant() {
                filters.set(
                    crate::models::FilterKey::OrganizationId,
                    Some(tenant.organization_id().to_string()),
                );
            }
        }
        // The engine owns the active model
        filters.changed_model_name = None;
        filters
    }
}

/// Push channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub relay_addr: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            app_key: None,
            cluster: None,
            channel: None,
            relay_addr: constants::DEFAULT_RELAY_ADDR.to_string(),
            max_retries: constants::PUSH_MAX_RETRIES,
            retry_backoff_ms: constants::PUSH_RETRY_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCredentials {
    pub app_key: String,
    pub cluster: String,
    pub channel: String,
}

impl PushConfig {
    /// The credentials, or the names of the missing settings.
    pub fn credentials(&self) -> Result<PushCredentials, Vec<&'static str>> {
        let fields = [
            (env::PUSHER_APP_KEY, &self.app_key),
            (env::PUSHER_APP_CLUSTER, &self.cluster),
            (env::PUSHER_APP_CHANNEL, &self.channel),
        ];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();

        match (&self.app_key, &self.cluster, &self.channel) {
            (Some(app_key), Some(cluster), Some(channel)) if missing.is_empty() => Ok(PushCredentials {
                app_key: app_key.clone(),
                cluster: cluster.clone(),
                channel: channel.clone(),
            }),
            _ => Err(missing),
        }
    }
}
