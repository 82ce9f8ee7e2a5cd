//! In-memory protocol client backing the unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use bytes::Bytes;

use crate::{
    client::{Flow, FtpClient, ListingEntry},
    error::{Error, FtpResult},
    path,
    session::{FtpFilesystem, FtpOptions},
};

/// Server-side state, shared between the client and the test body.
#[derive(Debug, Default)]
pub struct Remote {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
}

/// Command counters for cache and abort assertions.
#[derive(Debug, Default)]
pub struct Stats {
    pub listings: AtomicUsize,
    pub retrieves: AtomicUsize,
    pub stores: AtomicUsize,
    pub aborts: AtomicUsize,
}

/// An [`FtpClient`] over an in-memory tree. Retrieve streams in small
/// chunks so the range/abort paths get exercised on short payloads.
pub struct MemoryFtp {
    pub remote: Arc<Mutex<Remote>>,
    pub stats: Arc<Stats>,
    pub chunk: usize,
    pub fail_login: bool,
}

/// Builds a client over the given files and directories, returning the
/// shared state handles alongside it.
pub fn seeded(
    files: &[(&str, &[u8])],
    dirs: &[&str],
) -> (MemoryFtp, Arc<Mutex<Remote>>, Arc<Stats>) {
    let remote = Arc::new(Mutex::new(Remote {
        files: files
            .iter()
            .map(|(name, data)| ((*name).to_owned(), data.to_vec()))
            .collect(),
        dirs: dirs.iter().map(|dir| (*dir).to_owned()).collect(),
    }));
    let stats = Arc::new(Stats::default());

    let ftp = MemoryFtp {
        remote: remote.clone(),
        stats: stats.clone(),
        chunk: 8,
        fail_login: false,
    };

    (ftp, remote, stats)
}

pub async fn try_session(ftp: MemoryFtp) -> FtpResult<FtpFilesystem<MemoryFtp>> {
    FtpFilesystem::new(ftp, FtpOptions::new("memory")).await
}

pub async fn session(ftp: MemoryFtp) -> FtpFilesystem<MemoryFtp> {
    match try_session(ftp).await {
        Ok(fs) => fs,
        Err(err) => panic!("login failed: {}", err),
    }
}

fn entry(name: &str, kind: &str, size: Option<usize>) -> ListingEntry {
    let mut facts = HashMap::new();
    let _ = facts.insert("type".to_owned(), kind.to_owned());
    if let Some(size) = size {
        let _ = facts.insert("size".to_owned(), size.to_string());
    }
    let _ = facts.insert("modify".to_owned(), "20240506070809".to_owned());

    ListingEntry {
        name: name.to_owned(),
        facts,
    }
}

#[async_trait]
impl FtpClient for MemoryFtp {
    async fn connect(_host: &str, _port: u16) -> FtpResult<Self> {
        let (ftp, _, _) = seeded(&[], &[""]);
        Ok(ftp)
    }

    async fn login(
        &mut self,
        _user: Option<&str>,
        _pass: Option<&str>,
        _acct: Option<&str>,
    ) -> FtpResult<()> {
        if self.fail_login {
            return Err(Error::Protocol("530 login incorrect".to_owned()));
        }
        Ok(())
    }

    async fn retrieve(
        &mut self,
        path: &str,
        _blocksize: usize,
        restart: u64,
        on_chunk: &mut (dyn FnMut(Bytes) -> Flow + Send),
    ) -> FtpResult<()> {
        let _ = self.stats.retrieves.fetch_add(1, Ordering::SeqCst);

        let data = match self.remote.lock().unwrap().files.get(path) {
            Some(data) => data.clone(),
            None => return Err(Error::NotFound(path.to_owned())),
        };

        let start = (restart as usize).min(data.len());
        for chunk in data[start..].chunks(self.chunk.max(1)) {
            match on_chunk(Bytes::copy_from_slice(chunk)) {
                Flow::Continue => {}
                Flow::Done => return Ok(()),
                Flow::Abort => return Err(Error::TransferAborted),
            }
        }

        Ok(())
    }

    async fn store(
        &mut self,
        path: &str,
        data: &[u8],
        _blocksize: usize,
        restart: u64,
    ) -> FtpResult<()> {
        let _ = self.stats.stores.fetch_add(1, Ordering::SeqCst);

        let mut remote = self.remote.lock().unwrap();
        let file = remote.files.entry(path.to_owned()).or_default();
        file.truncate(restart as usize);
        file.extend_from_slice(data);
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> FtpResult<()> {
        match self.remote.lock().unwrap().files.remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(path.to_owned())),
        }
    }

    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        let mut remote = self.remote.lock().unwrap();
        match remote.files.remove(from) {
            Some(data) => {
                let _ = remote.files.insert(to.to_owned(), data);
                Ok(())
            }
            None => Err(Error::NotFound(from.to_owned())),
        }
    }

    async fn mkdir(&mut self, path: &str) -> FtpResult<()> {
        let mut remote = self.remote.lock().unwrap();
        if remote.dirs.insert(path.to_owned()) {
            Ok(())
        } else {
            Err(Error::Protocol(format!("550 {}: already exists", path)))
        }
    }

    async fn rmdir(&mut self, path: &str) -> FtpResult<()> {
        if self.remote.lock().unwrap().dirs.remove(path) {
            Ok(())
        } else {
            Err(Error::NotFound(path.to_owned()))
        }
    }

    async fn list_dir(&mut self, dir: &str) -> FtpResult<Vec<ListingEntry>> {
        let _ = self.stats.listings.fetch_add(1, Ordering::SeqCst);

        let remote = self.remote.lock().unwrap();
        if !remote.dirs.contains(dir) {
            return Err(Error::NotFound(dir.to_owned()));
        }

        let mut entries = vec![entry(".", "cdir", None), entry("..", "pdir", None)];

        for (name, data) in &remote.files {
            if path::parent(name) == dir {
                match name.rsplit_once('/') {
                    Some((_, base)) => entries.push(entry(base, "file", Some(data.len()))),
                    None => {}
                }
            }
        }

        for sub in &remote.dirs {
            if sub != dir && path::parent(sub) == dir {
                match sub.rsplit_once('/') {
                    // directories get a bogus size fact on purpose
                    Some((_, base)) => entries.push(entry(base, "dir", Some(4096))),
                    None => {}
                }
            }
        }

        Ok(entries)
    }

    async fn abort(&mut self) -> FtpResult<()> {
        let _ = self.stats.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
