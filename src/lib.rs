//! Buffered virtual filesystem over a single-connection transfer protocol.
//!
//! [`session::FtpFilesystem`] owns one protocol connection (any
//! [`client::FtpClient`] implementation) plus a manually invalidated
//! directory-listing cache, and hands out buffered [`fs::File`] handles
//! that turn the protocol's one-way streaming transfers into seekable
//! ranged reads and block-buffered, optionally transactional writes.

#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

pub mod client;
mod error;
pub mod fs;
mod path;
pub mod session;
#[cfg(test)]
pub(crate) mod testutil;

pub use client::{Flow, FtpClient, ListingEntry};
pub use error::{Error, FtpResult};
pub use fs::{DirEntry, File, FileKind, Mode};
pub use session::{FtpFilesystem, FtpOptions, DEFAULT_BLOCK_SIZE};
