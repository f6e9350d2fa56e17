//! Discovery error types

use thiserror::Error;

/// Transport-level failure while discovering facets.
///
/// These never reach the host: a session that hits one ends in `Failed`
/// and the aggregator keeps whatever it last received.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Could not reach the discovery service
    #[error("connection error: {0}")]
    Connection(String),

    /// No discovery stream exists for the entity
    #[error("no facet stream for {0}")]
    NotFound(String),

    /// Server reported an error inside the stream
    #[error("server error: {0}")]
    Server(String),

    /// Stream payload could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
