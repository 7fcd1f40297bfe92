//! Session configuration.

use crate::error::ConfigError;
use crate::subscriptions::{default_watches, Predicate, WatchDescriptor};
use crate::types::TenantContext;
use serde::{Deserialize, Serialize};

/// Configuration for a [`TenantSession`](crate::TenantSession).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Prefix of every channel topic.
    pub topic_prefix: String,

    /// Watches attached to the session's channel.
    pub watches: Vec<WatchDescriptor>,

    /// Buffer size of bus receivers created by the session.
    pub bus_channel_capacity: usize,

    /// Number of notification keys remembered for deduplication.
    pub notification_cache_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "dashboard".to_string(),
            watches: default_watches(),
            bus_channel_capacity: 256,
            notification_cache_size: 1024,
        }
    }
}

impl SyncConfig {
    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("topic_prefix must not be empty".into()));
        }
        if self.topic_prefix.contains(':') {
            return Err(ConfigError::Invalid(
                "topic_prefix must not contain ':'".into(),
            ));
        }
        if self.watches.is_empty() {
            return Err(ConfigError::Invalid("at least one watch is required".into()));
        }
        for watch in &self.watches {
            let column = match &watch.predicate {
                Predicate::All => continue,
                Predicate::ColumnEqTenant { column }
                | Predicate::ColumnEqUser { column }
                | Predicate::ColumnEq { column, .. } => column,
            };
            if column.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "watch on {} has an empty predicate column",
                    watch.table
                )));
            }
        }
        if self.bus_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "bus_channel_capacity must be at least 1".into(),
            ));
        }
        if self.notification_cache_size == 0 {
            return Err(ConfigError::Invalid(
                "notification_cache_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Topic of the channel for `context`.
    pub fn topic_for(&self, context: &TenantContext) -> String {
        channel_topic(&self.topic_prefix, context)
    }
}

/// `prefix:tenant/user`.
pub(crate) fn channel_topic(prefix: &str, context: &TenantContext) -> String {
    format!("{}:{}", prefix, context)
}
