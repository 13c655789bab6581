//! Engine configuration.
//!
//! An explicit struct handed to [`TaskEngine::new`](crate::engine::TaskEngine::new)
//! rather than process-wide ambient state. `from_env` reads the same variable
//! names the deployment environment already exports.

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retry budget assigned to new tasks when the caller does not supply one.
    pub default_max_retry: i32,
    /// Expiration window, in seconds, applied to new tasks without an explicit
    /// timeout. The cleanup sweep treats pending/running tasks past this
    /// deadline as timed out.
    pub expiration_timeout_secs: u64,
    /// Capacity of the broadcast channel backing the event publisher.
    pub event_channel_capacity: usize,
    /// Namespace segment of the push channel, isolating events per environment.
    pub pusher_channel_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retry: 3,
            expiration_timeout_secs: 3600,
            event_channel_capacity: 1024,
            pusher_channel_namespace: "default".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max_retry) = std::env::var("ASYNC_TASK_MAX_RETRY") {
            config.default_max_retry = max_retry.parse().map_err(|e| {
                EngineError::Configuration(format!("invalid ASYNC_TASK_MAX_RETRY: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("ASYNC_TASK_EXPIRATION_TIMEOUT") {
            config.expiration_timeout_secs = timeout.parse().map_err(|e| {
                EngineError::Configuration(format!("invalid ASYNC_TASK_EXPIRATION_TIMEOUT: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity = capacity.parse().map_err(|e| {
                EngineError::Configuration(format!("invalid EVENT_CHANNEL_CAPACITY: {e}"))
            })?;
        }

        if let Ok(namespace) = std::env::var("PUSHER_CHANNEL_NAMESPACE") {
            config.pusher_channel_namespace = namespace;
        }

        Ok(config)
    }
}
