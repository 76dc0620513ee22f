//! Error taxonomy for the LMS CLI follower
//!
//! Only `Connect*` and `ConnectionLost` ever leave the adapter layer. The other
//! variants are recoverable and are constructed at the point of detection so
//! they can be logged with a consistent message, then absorbed.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmsError {
    #[error("failed connecting to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("lost connection to LMS CLI")]
    ConnectionLost,

    #[error("no response to `{command}` within {timeout:?}")]
    QueryTimeout { command: String, timeout: Duration },

    #[error("malformed response ({reason}): {line}")]
    MalformedResponse { reason: &'static str, line: String },

    #[error("player table full ({capacity} entries), enumeration truncated")]
    RegistryFull { capacity: usize },

    #[error("no players online")]
    NoPlayersOnline,

    #[error("CLI I/O error: {0}")]
    Io(#[from] std::io::Error),
}
