//! Flow configuration
//!
//! User-facing strings and the default collection deadline. A runner owns one
//! `FlowConfig` and hands it to every step phase it drives.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FlowError;

/// Reply content that ends the flow before any collection function runs
pub const DEFAULT_EXIT_TOKEN: &str = "exit";

/// Runtime configuration for a flow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Exact reply content that triggers a voluntary exit
    pub exit_token: String,

    /// Sent when the participant exits
    pub exit_message: String,

    /// Sent when a collection phase runs out of time
    pub inactivity_message: String,

    /// Feedback for a rejection that carries no message of its own
    pub rejection_message: String,

    /// Deadline of a collection phase, unless the step sets its own
    #[serde(with = "humantime_serde")]
    pub collect_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            exit_token: DEFAULT_EXIT_TOKEN.to_string(),
            exit_message: "You left the conversation.".to_string(),
            inactivity_message: "The conversation ended due to inactivity.".to_string(),
            rejection_message: "That reply wasn't accepted, please try again.".to_string(),
            collect_timeout: Duration::from_millis(60_000),
        }
    }
}

impl FlowConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the exit token
    pub fn with_exit_token(mut self, token: impl Into<String>) -> Self {
        self.exit_token = token.into();
        self
    }

    /// Set the message sent on voluntary exit
    pub fn with_exit_message(mut self, message: impl Into<String>) -> Self {
        self.exit_message = message.into();
        self
    }

    /// Set the message sent on inactivity
    pub fn with_inactivity_message(mut self, message: impl Into<String>) -> Self {
        self.inactivity_message = message.into();
        self
    }

    /// Set the default rejection feedback
    pub fn with_rejection_message(mut self, message: impl Into<String>) -> Self {
        self.rejection_message = message.into();
        self
    }

    /// Set the default collection deadline
    pub fn with_collect_timeout(mut self, timeout: Duration) -> Self {
        self.collect_timeout = timeout;
        self
    }

    /// Check the config before a run starts
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.exit_token.is_empty() {
            return Err(FlowError::config_error("exit token cannot be empty"));
        }
        if self.collect_timeout.is_zero() {
            return Err(FlowError::config_error("collect timeout must be greater than zero"));
        }
        Ok(())
    }
}
