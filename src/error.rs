//! Error types for dataset loading.

use thiserror::Error;

/// Failure to obtain the raw text of a dataset.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Local file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request failed or returned a non-success status
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Location string is neither a usable path nor a valid URL
    #[error("invalid dataset location: {0}")]
    InvalidLocation(String),

    /// Both the primary and the fallback location failed
    #[error("{primary}; fallback also failed: {fallback}")]
    Exhausted {
        primary: Box<LoadError>,
        fallback: Box<LoadError>,
    },
}
