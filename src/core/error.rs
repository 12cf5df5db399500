//! Error types for the giro library
//!
//! Every expected failure mode of a planning run is a typed variant here;
//! recoverable conditions inside the search loop (a candidate with no path,
//! a route outside the tolerance window) are outcomes, not errors, and live
//! in `core::search`.

use thiserror::Error;

/// Main error type for giro operations
#[derive(Debug, Error)]
pub enum Error {
    /// Address could not be resolved to coordinates
    #[error("Address could not be resolved: {0}")]
    Geocode(String),

    /// Graph source unreachable or returned no routable data for the region.
    /// Recoverable: the expansion controller retries at a smaller radius
    /// until the iteration bound is reached.
    #[error("Graph fetch failed: {0}")]
    GraphFetch(String),

    /// Iteration bound exhausted without an accepted route
    #[error("No circular route within tolerance after {iterations} attempts")]
    PlanningFailed { iterations: u32 },

    /// Track output could not be produced
    #[error("Track serialization failed: {0}")]
    Serialization(String),

    /// Invalid request parameters, rejected at the boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cooperative cancellation observed between search steps
    #[error("Planning cancelled")]
    Cancelled,

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-specific error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network connectivity issues
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::Network(err.to_string())
        } else {
            Error::Http(err.to_string())
        }
    }
}

/// Convenience result type for giro operations
pub type Result<T> = std::result::Result<T, Error>;
