//! Error types for the viewer binary.
//!
//! [`ViewerError`] wraps every failure that can stop startup, so `main` can
//! propagate with `?`. Once the sync loop is running nothing is fatal.

/// Top-level error for the viewer binary.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crossview_core::ConfigError,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },

    /// A startup step other than config or logging failed.
    #[error("startup error: {message}")]
    Startup {
        /// Description of the failure.
        message: String,
    },
}
