//! Interface to the underlying transfer-protocol client.
//!
//! The crate does not speak the wire protocol itself; it drives any client
//! that can run the classic command set over one control connection.
//! [`FtpClient`] is that boundary, shaped after the commands the session
//! layer actually issues: retrieve and store with restart offsets, machine
//! listings, and the path-level mutations.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::FtpResult;

/// Chunk size for streaming retrieve and store commands. Fixed,
/// independent of a file handle's own block size.
pub const TRANSFER_BLOCK: usize = 64 * 1024;

/// Per-chunk decision returned by a [`FtpClient::retrieve`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep streaming.
    Continue,
    /// Stop delivering chunks; the transfer may drain to its natural end.
    Done,
    /// Stop immediately; the caller follows up with the abort command.
    Abort,
}

/// One raw machine-listing entry: child name plus the fact map the server
/// reported for it (`type`, `size`, `modify`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub facts: HashMap<String, String>,
}

/// A connected transfer-protocol client.
///
/// One command is in flight at a time: every method takes `&mut self` and
/// the owning session keeps the client behind a mutex for its whole life.
/// Implementations map a missing path to [`NotFound`] and any other
/// rejected command to [`Protocol`].
///
/// [`NotFound`]: crate::Error::NotFound
/// [`Protocol`]: crate::Error::Protocol
#[async_trait]
pub trait FtpClient: Send {
    /// Opens the control connection. No authentication happens here.
    async fn connect(host: &str, port: u16) -> FtpResult<Self>
    where
        Self: Sized;

    /// Authenticates the connection. Anonymous login when `user` is `None`.
    async fn login(
        &mut self,
        user: Option<&str>,
        pass: Option<&str>,
        acct: Option<&str>,
    ) -> FtpResult<()>;

    /// Streams the object at `path` from byte `restart` onward, invoking
    /// `on_chunk` once per received chunk of at most `blocksize` bytes.
    ///
    /// The callback's [`Flow`] answer steers the transfer: on
    /// [`Flow::Abort`] the implementation stops reading the data stream
    /// and returns [`TransferAborted`], after which the caller issues
    /// [`abort`](FtpClient::abort); on [`Flow::Done`] it stops delivering
    /// chunks and returns `Ok` once the transfer winds down.
    ///
    /// [`TransferAborted`]: crate::Error::TransferAborted
    async fn retrieve(
        &mut self,
        path: &str,
        blocksize: usize,
        restart: u64,
        on_chunk: &mut (dyn FnMut(Bytes) -> Flow + Send),
    ) -> FtpResult<()>;

    /// Stores `data` into the object at `path` starting at byte `restart`.
    async fn store(
        &mut self,
        path: &str,
        data: &[u8],
        blocksize: usize,
        restart: u64,
    ) -> FtpResult<()>;

    /// Deletes the file at `path`.
    async fn delete(&mut self, path: &str) -> FtpResult<()>;

    /// Renames `from` to `to`.
    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()>;

    /// Creates the directory at `path`.
    async fn mkdir(&mut self, path: &str) -> FtpResult<()>;

    /// Removes the directory at `path`.
    async fn rmdir(&mut self, path: &str) -> FtpResult<()>;

    /// Machine listing of the directory at `path`.
    async fn list_dir(&mut self, path: &str) -> FtpResult<Vec<ListingEntry>>;

    /// Aborts the transfer currently in flight on the connection.
    async fn abort(&mut self) -> FtpResult<()>;
}
