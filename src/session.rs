use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    client::{FtpClient, ListingEntry},
    error::{Error, FtpResult},
    fs::{DirEntry, File, Mode},
    path,
};

/// Default read-ahead / write buffer size for file handles.
pub const DEFAULT_BLOCK_SIZE: usize = 5 * 1024 * 1024;

/// Connection settings for [`FtpFilesystem`].
#[derive(Debug, Clone)]
pub struct FtpOptions {
    /// Remote server name or address.
    pub host: String,
    /// Control connection port.
    pub port: u16,
    /// Login name; anonymous login when omitted.
    pub username: Option<String>,
    /// Password, if the login requires one.
    pub password: Option<String>,
    /// Account string, for servers that require one on login.
    pub account: Option<String>,
    /// Read-ahead or write buffer size override for file handles.
    pub block_size: Option<usize>,
    /// Remote directory for transactional staging objects.
    pub tempdir: String,
}

impl FtpOptions {
    pub fn new<T: Into<String>>(host: T) -> Self {
        Self {
            host: host.into(),
            port: 21,
            username: None,
            password: None,
            account: None,
            block_size: None,
            tempdir: "/tmp".to_owned(),
        }
    }
}

type DirCache = HashMap<String, Vec<ListingEntry>>;

/// A remote transfer endpoint exposed as a filesystem.
///
/// Owns one protocol connection and a directory-listing cache. Every
/// operation, including all I/O of the file handles it opens, holds the
/// connection for the duration of exactly one command. There is no
/// pooling and no reconnect; multi-command sequences are the caller's to
/// coordinate.
///
/// Cached listings have no expiry. Mutating operations drop the affected
/// keys; anything that changes a directory behind the session's back is
/// only picked up after [`invalidate_cache`](FtpFilesystem::invalidate_cache).
pub struct FtpFilesystem<C: FtpClient> {
    ftp: Arc<Mutex<C>>,
    cache: Arc<Mutex<DirCache>>,
    host: String,
    port: u16,
    blocksize: usize,
    tempdir: String,
}

impl<C: FtpClient> Clone for FtpFilesystem<C> {
    fn clone(&self) -> Self {
        Self {
            ftp: self.ftp.clone(),
            cache: self.cache.clone(),
            host: self.host.clone(),
            port: self.port,
            blocksize: self.blocksize,
            tempdir: self.tempdir.clone(),
        }
    }
}

impl<C: FtpClient> FtpFilesystem<C> {
    /// Wraps an already-connected client and performs the login handshake
    /// eagerly. Anonymous login when no username is configured.
    pub async fn new(mut ftp: C, options: FtpOptions) -> FtpResult<Self> {
        ftp.login(
            options.username.as_deref(),
            options.password.as_deref(),
            options.account.as_deref(),
        )
        .await
        .map_err(|err| Error::Connection(err.to_string()))?;

        debug!("logged in to {}:{}", options.host, options.port);

        Ok(Self {
            ftp: Arc::new(Mutex::new(ftp)),
            cache: Arc::new(Mutex::new(HashMap::new())),
            host: options.host,
            port: options.port,
            blocksize: options.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            tempdir: options.tempdir,
        })
    }

    /// Connects to `options.host:options.port` and logs in.
    pub async fn connect(options: FtpOptions) -> FtpResult<Self> {
        let ftp = C::connect(&options.host, options.port)
            .await
            .map_err(|err| Error::Connection(err.to_string()))?;

        Self::new(ftp, options).await
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Effective default block size for file handles.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.blocksize
    }

    pub(crate) fn tempdir(&self) -> &str {
        &self.tempdir
    }

    pub(crate) fn ftp(&self) -> &Arc<Mutex<C>> {
        &self.ftp
    }

    /// Raw listing of a directory, served from cache when possible.
    async fn entries(&self, dir: &str) -> FtpResult<Vec<ListingEntry>> {
        if let Some(entries) = self.cache.lock().await.get(dir) {
            debug!("listing cache hit for {:?}", dir);
            return Ok(entries.clone());
        }

        let entries = self.ftp.lock().await.list_dir(dir).await?;
        debug!("cached {} entries for {:?}", entries.len(), dir);
        let _ = self
            .cache
            .lock()
            .await
            .insert(dir.to_owned(), entries.clone());

        Ok(entries)
    }

    /// Sorted fully-qualified paths of the directory's children, without
    /// the `.`/`..` pseudo-entries.
    pub async fn list<P: AsRef<str>>(&self, dir: P) -> FtpResult<Vec<String>> {
        let dir = path::normalize(dir.as_ref());
        let entries = self.entries(&dir).await?;

        let mut out: Vec<String> = entries
            .iter()
            .filter(|entry| entry.name != "." && entry.name != "..")
            .map(|entry| path::join(&dir, &entry.name))
            .collect();
        out.sort();
        out.dedup();

        Ok(out)
    }

    /// Entries of the directory sorted by name, sizes coerced per kind.
    pub async fn list_detailed<P: AsRef<str>>(&self, dir: P) -> FtpResult<Vec<DirEntry>> {
        let dir = path::normalize(dir.as_ref());
        let entries = self.entries(&dir).await?;

        let mut out: Vec<DirEntry> = entries
            .iter()
            .filter(|entry| entry.name != "." && entry.name != "..")
            .map(|entry| DirEntry::from_listing(&dir, entry))
            .collect();
        out.sort_by(|a, b| a.path().cmp(b.path()));

        Ok(out)
    }

    /// Metadata of a single path, resolved by scanning its parent's
    /// listing for a matching name.
    pub async fn info<P: AsRef<str>>(&self, target: P) -> FtpResult<DirEntry> {
        let target = path::normalize(target.as_ref());
        let entries = self.list_detailed(path::parent(&target)).await?;

        entries
            .into_iter()
            .find(|entry| entry.path() == target)
            .ok_or(Error::NotFound(target))
    }

    /// Checks whether a file or directory exists at the path.
    pub async fn exists<P: AsRef<str>>(&self, target: P) -> FtpResult<bool> {
        match self.info(target).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Drops one directory's cached listing, or every cached listing.
    pub async fn invalidate_cache(&self, dir: Option<&str>) {
        let mut cache = self.cache.lock().await;
        match dir {
            Some(dir) => {
                let _ = cache.remove(&path::normalize(dir));
            }
            None => cache.clear(),
        }
    }

    /// Deletes the file at `target` and drops the parent's cached listing.
    pub async fn remove<P: AsRef<str>>(&self, target: P) -> FtpResult<()> {
        let target = target.as_ref();
        self.ftp.lock().await.delete(target).await?;
        self.invalidate_cache(Some(path::parent(target))).await;
        Ok(())
    }

    /// Renames `from` to `to` and drops both endpoints' parent listings;
    /// the two parents may differ.
    pub async fn rename<F, T>(&self, from: F, to: T) -> FtpResult<()>
    where
        F: AsRef<str>,
        T: AsRef<str>,
    {
        let (from, to) = (from.as_ref(), to.as_ref());
        self.ftp.lock().await.rename(from, to).await?;
        self.invalidate_cache(Some(path::parent(from))).await;
        self.invalidate_cache(Some(path::parent(to))).await;
        Ok(())
    }

    /// Creates a directory and drops the parent's cached listing.
    pub async fn mkdir<P: AsRef<str>>(&self, target: P) -> FtpResult<()> {
        let target = target.as_ref();
        self.ftp.lock().await.mkdir(target).await?;
        self.invalidate_cache(Some(path::parent(target))).await;
        Ok(())
    }

    /// Removes a directory and drops its own and the parent's cached
    /// listings.
    pub async fn rmdir<P: AsRef<str>>(&self, target: P) -> FtpResult<()> {
        let target = target.as_ref();
        self.ftp.lock().await.rmdir(target).await?;
        self.invalidate_cache(Some(target)).await;
        self.invalidate_cache(Some(path::parent(target))).await;
        Ok(())
    }

    /// Opens `target` for reading.
    pub async fn open<P: AsRef<str>>(&self, target: P) -> FtpResult<File<C>> {
        self.open_with(target, Mode::Read, None, true).await
    }

    /// Opens `target` for writing; bytes become visible under the real
    /// name as they are flushed.
    pub async fn create<P: AsRef<str>>(&self, target: P) -> FtpResult<File<C>> {
        self.open_with(target, Mode::Write, None, true).await
    }

    /// Opens a file handle with an explicit mode, block size and commit
    /// behavior. With `autocommit` off, writes land under a staging name
    /// in the session tempdir until [`File::commit`].
    pub async fn open_with<P: AsRef<str>>(
        &self,
        target: P,
        mode: Mode,
        block_size: Option<usize>,
        autocommit: bool,
    ) -> FtpResult<File<C>> {
        File::open(
            self.clone(),
            &path::normalize(target.as_ref()),
            mode,
            block_size.unwrap_or(self.blocksize),
            autocommit,
        )
        .await
    }

    /// Reads the whole object at `target`.
    pub async fn read<P: AsRef<str>>(&self, target: P) -> FtpResult<Vec<u8>> {
        let mut file = self.open(target).await?;
        let data = file.read_to_end().await?;
        file.close().await?;
        Ok(data.to_vec())
    }

    /// Writes `data` as the whole content of the object at `target`.
    pub async fn write<P: AsRef<str>>(&self, target: P, data: &[u8]) -> FtpResult<()> {
        let mut file = self.create(target).await?;
        let _ = file.write(data).await?;
        file.close().await
    }
}
