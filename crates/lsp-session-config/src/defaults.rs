use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default ceiling on a frame body, in bytes, shared with the session layer.
pub use lsp_session::DEFAULT_MAX_CONTENT_LENGTH;

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default frame body ceiling.
#[must_use]
pub fn default_max_content_length() -> usize {
    DEFAULT_MAX_CONTENT_LENGTH
}
