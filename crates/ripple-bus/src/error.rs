//! Error types for ripple-bus
//!
//! Transport failures never reach a publisher: channels log them and carry on.
//! They are still typed so transports and their tests can reason about them.

use std::path::PathBuf;
use thiserror::Error;

/// Failure moving bytes between processes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or rendezvous directory I/O failed
    #[error("transport I/O error at {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Rendezvous directory could not be determined or prepared
    #[error("rendezvous error: {0}")]
    Rendezvous(String),

    /// Socket path exceeds the platform's unix socket address limit
    #[error("socket path {} is {len} bytes, the limit is {max}", path.display())]
    PathTooLong {
        /// Socket path that was too long
        path: PathBuf,
        /// Its length in bytes
        len: usize,
        /// Longest usable path
        max: usize,
    },

    /// Payload does not fit in one datagram
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Configured maximum
        max: usize,
    },
}

impl TransportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Bus error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error from the core crate (invalid notification, bad config)
    #[error(transparent)]
    Core(#[from] ripple_core::Error),

    /// Transport error
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
