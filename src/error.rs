use std::io;
use thiserror::Error;

/// Enum for filesystem errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Connect or login handshake failed
    #[error("connection: {0}")]
    Connection(String),
    /// Path absent on a listing or lookup
    #[error("not found: {0}")]
    NotFound(String),
    /// Command rejected by the remote end, surfaced verbatim
    #[error("protocol: {0}")]
    Protocol(String),
    /// Internal signal cutting an in-flight retrieve short once the
    /// requested range is complete. Caught inside the ranged read,
    /// never returned from the public API.
    #[error("transfer aborted")]
    TransferAborted,
    /// Any errors related to I/O
    #[error("I/O: {0}")]
    IO(String),
    /// Operation on a closed or already resolved file handle
    #[error("file handle is closed")]
    Closed,
}

pub type FtpResult<T> = Result<T, Error>;

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::IO(error.to_string())
    }
}
