//! Error types for configuration and server access.

use thiserror::Error;

/// Problems detected while validating configuration at start-up.
///
/// All of these are fatal: the process exits before any connection attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required connection setting was not provided.
    #[error("missing required setting {0} (set it in the environment or the config file)")]
    MissingCredential(&'static str),

    /// A skip-type entry is not one of movie, show or photo.
    #[error("invalid library type '{0}' in skip list (expected movie, show or photo)")]
    InvalidLibraryType(String),

    /// The daily run time does not match `HH:MM` or `HH:MM:SS` (24-hour).
    #[error("invalid run time '{0}' (expected HH:MM or HH:MM:SS, 24-hour)")]
    InvalidRunTime(String),

    /// Every feature check is switched off.
    #[error("no checks enabled; enable at least one of previews, voice activity, intro markers or credits markers")]
    NoFeatureEnabled,
}

/// Errors raised while talking to the media server.
#[derive(Debug, Error)]
pub enum PlexError {
    /// HTTP transport error (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The configured server URL is not usable.
    #[error("invalid server URL '{0}'")]
    InvalidUrl(String),
}
