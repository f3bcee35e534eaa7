//! Error taxonomy for the bridge.
//!
//! Startup failures ([`BridgeError::ConfigInvalid`], [`BridgeError::AuthFailed`])
//! terminate the process. Steady-state failures ([`BridgeError::QueryFailed`],
//! [`BridgeError::DeliveryFailed`]) stay inside the cycle or record that hit them.

use docbridge_clients::{ConfigError, NotionError, SlackError};
use thiserror::Error;

/// Bridge error types.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or malformed configuration.
    #[error("Invalid configuration: {message}")]
    ConfigInvalid {
        /// What was wrong.
        message: String,
    },

    /// A startup probe against one of the platforms failed.
    #[error("Authentication against {platform} failed: {message}")]
    AuthFailed {
        /// Platform name ("slack" or "notion").
        platform: String,
        /// Underlying error.
        message: String,
    },

    /// The change query failed; the cycle is abandoned.
    #[error("Query against store {store_id} failed: {message}")]
    QueryFailed {
        /// Queried store.
        store_id: String,
        /// Underlying error.
        message: String,
    },

    /// A message could not be delivered.
    #[error("Delivery to {channel} failed: {message}")]
    DeliveryFailed {
        /// Destination as given by the caller.
        channel: String,
        /// Underlying error.
        message: String,
    },
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Whether this error should end the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::ConfigInvalid { .. } | BridgeError::AuthFailed { .. }
        )
    }

    /// Startup probe failure for `platform`.
    pub fn auth(platform: &str, err: impl std::fmt::Display) -> Self {
        BridgeError::AuthFailed {
            platform: platform.to_string(),
            message: err.to_string(),
        }
    }

    /// Query failure against `store_id`.
    pub fn query(store_id: &str, err: NotionError) -> Self {
        BridgeError::QueryFailed {
            store_id: store_id.to_string(),
            message: err.to_string(),
        }
    }

    /// Delivery failure to `channel`.
    pub fn delivery(channel: &str, err: SlackError) -> Self {
        BridgeError::DeliveryFailed {
            channel: channel.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::ConfigInvalid {
            message: err.to_string(),
        }
    }
}
