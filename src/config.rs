//! # Configuration Module
//!
//! Loads the console front end's settings from environment variables (and a
//! `.env` file, if present) and turns them into the engine's `FlowConfig`.

use anyhow::{Context, Result};
use dialog_flow::FlowConfig;
use std::env;
use std::time::Duration;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Settings for one console session.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name the console participant's replies are attributed to
    pub participant: String,

    /// Engine settings: exit token, termination messages, and timeout
    pub flow: FlowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            participant: "guest".to_string(),
            flow: FlowConfig::default(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables:
    /// - `DIALOG_FLOW_PARTICIPANT`
    /// - `DIALOG_FLOW_EXIT_TOKEN`
    /// - `DIALOG_FLOW_TIMEOUT_MS`
    /// - `DIALOG_FLOW_EXIT_MESSAGE`, `DIALOG_FLOW_INACTIVITY_MESSAGE`,
    ///   `DIALOG_FLOW_REJECTION_MESSAGE`
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let mut config = AppConfig::default();

        if let Ok(val) = env::var("DIALOG_FLOW_PARTICIPANT") {
            config.participant = val;
        }

        if let Ok(val) = env::var("DIALOG_FLOW_EXIT_TOKEN") {
            config.flow.exit_token = val;
        }

        if let Ok(val) = env::var("DIALOG_FLOW_TIMEOUT_MS") {
            let millis: u64 = val
                .parse()
                .context("DIALOG_FLOW_TIMEOUT_MS must be a whole number of milliseconds")?;
            config.flow.collect_timeout = Duration::from_millis(millis);
        }

        if let Ok(val) = env::var("DIALOG_FLOW_EXIT_MESSAGE") {
            config.flow.exit_message = val;
        }

        if let Ok(val) = env::var("DIALOG_FLOW_INACTIVITY_MESSAGE") {
            config.flow.inactivity_message = val;
        }

        if let Ok(val) = env::var("DIALOG_FLOW_REJECTION_MESSAGE") {
            config.flow.rejection_message = val;
        }

        Ok(config)
    }

    /// Validate the configuration before any prompt is sent.
    pub fn validate(&self) -> Result<()> {
        if self.participant.trim().is_empty() {
            anyhow::bail!("DIALOG_FLOW_PARTICIPANT cannot be empty");
        }

        self.flow
            .validate()
            .context("Invalid flow configuration")?;

        Ok(())
    }
}
