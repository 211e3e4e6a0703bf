//! Layered configuration for the stdio language server.
//!
//! Values are merged by `ortho_config` from command-line flags and
//! `LSP_SESSION_*` environment variables, falling back to the built-in
//! defaults exported alongside [`Config`].

mod defaults;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_CONTENT_LENGTH, default_log_filter_string,
    default_log_format, default_max_content_length,
};
pub use logging::LogFormat;

/// Resolved configuration for a server process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(prefix = "LSP_SESSION")]
pub struct Config {
    /// Tracing filter expression, such as `info` or `lsp_session=debug`.
    pub log_filter: String,
    /// Output format of the diagnostic log on stderr.
    pub log_format: LogFormat,
    /// Largest frame body accepted from the client, in bytes.
    pub max_content_length: usize,
    /// Answer rejected handshakes and failed requests with error replies.
    ///
    /// Left unset when neither the flag nor the environment names it, so an
    /// absent command-line flag cannot mask `LSP_SESSION_REPLY_TO_REJECTED`.
    pub reply_to_rejected: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_content_length: default_max_content_length(),
            reply_to_rejected: None,
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Largest accepted frame body, in bytes.
    #[must_use]
    pub fn max_content_length(&self) -> usize {
        self.max_content_length
    }

    /// Whether rejected messages receive error replies.
    #[must_use]
    pub fn reply_to_rejected(&self) -> bool {
        self.reply_to_rejected.unwrap_or(false)
    }
}
