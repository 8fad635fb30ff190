//! Errors from loading a diagram library and rendering diagrams.

use std::time::Duration;

/// Error acquiring a diagram library.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Transport failure (DNS, connect, TLS, read).
    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    /// Server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Server answered 2xx with nothing in the body.
    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Loader did not complete within the configured limit.
    #[error("library load timed out after {0:?}")]
    Timeout(Duration),

    /// Background fetch task panicked or was cancelled.
    #[error("library load task failed: {0}")]
    Join(String),
}

/// Error rendering a single diagram on a Kroki server.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response is not SVG: {0}")]
    InvalidSvg(String),
}
