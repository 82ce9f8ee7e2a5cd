use std::io::SeekFrom;

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

use crate::{
    client::{Flow, FtpClient, TRANSFER_BLOCK},
    error::{Error, FtpResult},
    path,
    session::FtpFilesystem,
};

/// Direction of a file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// Handle lifecycle. Write handles opened without autocommit additionally
/// reach `Committed` or `Discarded`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
    Committed,
    Discarded,
}

/// Result of the last ranged fetch, kept for readahead.
struct Window {
    start: u64,
    data: Bytes,
}

/// Buffered handle to one remote object.
///
/// Reads go through a single readahead window refilled by ranged fetches.
/// Writes stage into a local buffer and flush in block-sized chunks using
/// store commands with restart offsets. A handle opened with autocommit
/// off writes to a staging name under the session tempdir and publishes
/// to the real name only on [`commit`](File::commit).
///
/// All I/O shares the session's single connection; `&mut self` receivers
/// keep a handle to one in-flight operation at a time.
pub struct File<C: FtpClient> {
    fs: FtpFilesystem<C>,
    path: String,
    /// Final name of a transactional write; `path` then holds the staging name.
    target: Option<String>,
    mode: Mode,
    blocksize: usize,
    state: State,
    pos: u64,
    size: u64,
    window: Option<Window>,
    buffer: BytesMut,
    /// Bytes already flushed to the remote object.
    offset: u64,
}

impl<C: FtpClient> File<C> {
    pub(crate) async fn open(
        fs: FtpFilesystem<C>,
        target: &str,
        mode: Mode,
        blocksize: usize,
        autocommit: bool,
    ) -> FtpResult<Self> {
        let (path, staged) = match mode {
            Mode::Write if !autocommit => {
                let staging = path::join(fs.tempdir(), &Uuid::new_v4().to_string());
                debug!("staging {} as {}", target, staging);
                (staging, Some(target.to_owned()))
            }
            _ => (target.to_owned(), None),
        };

        let size = match mode {
            Mode::Read => fs.info(&path).await?.size(),
            Mode::Write => 0,
        };

        Ok(Self {
            fs,
            path,
            target: staged,
            mode,
            blocksize,
            state: State::Open,
            pos: 0,
            size,
            window: None,
            buffer: BytesMut::new(),
            offset: 0,
        })
    }

    /// Path the handle operates on. For a transactional write this is the
    /// staging name until committed.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final visible name of a transactional write handle.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current logical position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Object size learned at open. Read handles only.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    fn check_open(&self) -> FtpResult<()> {
        match self.state {
            State::Open => Ok(()),
            _ => Err(Error::Closed),
        }
    }

    fn check_mode(&self, mode: Mode, what: &str) -> FtpResult<()> {
        self.check_open()?;
        if self.mode == mode {
            Ok(())
        } else {
            Err(Error::Protocol(format!("{} on a {:?} handle", what, self.mode)))
        }
    }

    /// Returns the bytes `[start, end)` of the remote object, or fewer
    /// when the object ends first.
    ///
    /// The protocol can only stream "from `start` until done", so the
    /// chunk callback counts what arrived: a chunk overshooting the range
    /// is cut at the boundary and the transfer aborted on the spot; a
    /// transfer landing exactly on the boundary is left to wind down by
    /// itself. The abort signal stays inside this method.
    ///
    /// Relies on the server honoring the restart offset; a server that
    /// ignores it streams from byte zero and the range is wrong.
    pub async fn fetch_range(&mut self, start: u64, end: u64) -> FtpResult<Bytes> {
        self.check_mode(Mode::Read, "fetch")?;

        let want = end.saturating_sub(start) as usize;
        if want == 0 {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::with_capacity(want);
        let mut ftp = self.fs.ftp().lock().await;

        let result = ftp
            .retrieve(&self.path, TRANSFER_BLOCK, start, &mut |chunk| {
                let have = out.len();
                if have + chunk.len() > want {
                    out.extend_from_slice(&chunk[..want - have]);
                    Flow::Abort
                } else {
                    out.extend_from_slice(&chunk);
                    if out.len() == want {
                        Flow::Done
                    } else {
                        Flow::Continue
                    }
                }
            })
            .await;

        match result {
            Ok(()) => Ok(out.freeze()),
            Err(Error::TransferAborted) => {
                ftp.abort().await?;
                debug!("aborted retrieve of {} at {} bytes", self.path, out.len());
                Ok(out.freeze())
            }
            Err(err) => Err(err),
        }
    }

    fn window_covers(&self, start: u64, end: u64) -> bool {
        self.window
            .as_ref()
            .is_some_and(|w| start >= w.start && end <= w.start + w.data.len() as u64)
    }

    /// Reads up to `len` bytes from the current position, fetching at
    /// least one block per remote round trip.
    pub async fn read(&mut self, len: usize) -> FtpResult<Bytes> {
        self.check_mode(Mode::Read, "read")?;

        let start = self.pos;
        if start >= self.size || len == 0 {
            return Ok(Bytes::new());
        }

        let end = (start + len as u64).min(self.size);
        if !self.window_covers(start, end) {
            let fetch_end = (start + len.max(self.blocksize) as u64).min(self.size);
            let data = self.fetch_range(start, fetch_end).await?;
            self.window = Some(Window { start, data });
        }

        let out = match &self.window {
            Some(w) => {
                let hi = ((end - w.start) as usize).min(w.data.len());
                let lo = ((start - w.start) as usize).min(hi);
                w.data.slice(lo..hi)
            }
            None => Bytes::new(),
        };

        self.pos += out.len() as u64;
        Ok(out)
    }

    /// Reads from the current position to the end of the object.
    pub async fn read_to_end(&mut self) -> FtpResult<Bytes> {
        let remaining = self.size.saturating_sub(self.pos) as usize;
        self.read(remaining).await
    }

    /// Repositions the read cursor. Write handles only ever append.
    pub fn seek(&mut self, position: SeekFrom) -> FtpResult<u64> {
        self.check_mode(Mode::Read, "seek")?;

        let new_pos = match position {
            SeekFrom::Start(pos) => pos as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => self.size as i64 + delta,
        };

        if new_pos < 0 {
            return Err(Error::IO(
                "cannot move file pointer before the beginning".to_owned(),
            ));
        }

        self.pos = new_pos as u64;
        Ok(self.pos)
    }

    /// Stages `data` for upload, flushing whole blocks as soon as the
    /// local buffer reaches the block size.
    pub async fn write(&mut self, data: &[u8]) -> FtpResult<usize> {
        self.check_mode(Mode::Write, "write")?;

        self.buffer.extend_from_slice(data);
        self.pos += data.len() as u64;

        if self.buffer.len() >= self.blocksize {
            let _ = self.upload_chunk(false).await?;
        }

        Ok(data.len())
    }

    /// Flushes the staged buffer to the remote object with a store command
    /// restarting at the flush offset, so successive flushes resume the
    /// upload where the previous one ended.
    ///
    /// `last` forces the store through even with an empty buffer, which
    /// is what creates a zero-byte object.
    pub async fn upload_chunk(&mut self, last: bool) -> FtpResult<bool> {
        self.check_mode(Mode::Write, "flush")?;

        if self.buffer.is_empty() && !(last && self.offset == 0) {
            return Ok(true);
        }

        let mut ftp = self.fs.ftp().lock().await;
        ftp.store(&self.path, &self.buffer, TRANSFER_BLOCK, self.offset)
            .await?;
        drop(ftp);

        debug!(
            "stored {} bytes to {} at offset {}",
            self.buffer.len(),
            self.path,
            self.offset
        );

        self.offset += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(true)
    }

    /// Flushes any staged bytes and closes the handle. Closing twice is a
    /// no-op.
    pub async fn close(&mut self) -> FtpResult<()> {
        if self.state != State::Open {
            return Ok(());
        }

        if self.mode == Mode::Write {
            let _ = self.upload_chunk(true).await?;
            self.fs
                .invalidate_cache(Some(path::parent(&self.path)))
                .await;
        }

        self.window = None;
        self.state = State::Closed;
        Ok(())
    }

    /// Publishes a transactional write by renaming the staging object to
    /// its target name. Valid only on a closed, unresolved handle.
    pub async fn commit(&mut self) -> FtpResult<()> {
        let target = self.resolvable("commit")?.to_owned();
        self.fs.rename(&self.path, &target).await?;
        self.state = State::Committed;
        Ok(())
    }

    /// Abandons a transactional write by deleting the staging object. The
    /// target name is never touched.
    pub async fn discard(&mut self) -> FtpResult<()> {
        let _ = self.resolvable("discard")?;
        self.fs.remove(&self.path).await?;
        self.state = State::Discarded;
        Ok(())
    }

    fn resolvable(&self, what: &str) -> FtpResult<&str> {
        match (&self.target, self.state) {
            (Some(target), State::Closed) => Ok(target),
            (Some(_), State::Open) => {
                Err(Error::Protocol(format!("{} before close", what)))
            }
            (Some(_), _) => Err(Error::Closed),
            (None, _) => Err(Error::Protocol(format!(
                "{} on a non-transactional handle",
                what
            ))),
        }
    }
}

impl<C: FtpClient> Drop for File<C> {
    fn drop(&mut self) {
        if self.target.is_some() && matches!(self.state, State::Open | State::Closed) {
            warn!(
                "transactional handle for {} dropped without commit or discard; staging object {} is orphaned",
                self.target.as_deref().unwrap_or_default(),
                self.path
            );
        } else if self.state == State::Open && self.mode == Mode::Write && !self.buffer.is_empty()
        {
            warn!(
                "write handle for {} dropped with {} unflushed bytes",
                self.path,
                self.buffer.len()
            );
        }
    }
}
