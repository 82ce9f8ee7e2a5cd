use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{client::ListingEntry, path};

/// Entry kind as reported by the machine listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    /// Any other server-reported kind (symlinks, special files, ...).
    Other(String),
}

impl FileKind {
    fn from_fact(fact: &str) -> Self {
        match fact {
            "file" => Self::File,
            "dir" => Self::Directory,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// One entry of a directory listing.
///
/// `name` is the fully-qualified path of the child. `size` is in bytes
/// and forced to zero for anything that is not a regular file, whatever
/// the server reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    name: String,
    kind: FileKind,
    size: u64,
    facts: HashMap<String, String>,
}

impl DirEntry {
    pub(crate) fn from_listing(dir: &str, raw: &ListingEntry) -> Self {
        let kind = match raw.facts.get("type") {
            Some(fact) => FileKind::from_fact(fact),
            None => FileKind::Other("unknown".to_owned()),
        };

        let size = match kind {
            FileKind::File => raw
                .facts
                .get("size")
                .and_then(|size| size.parse().ok())
                .unwrap_or(0),
            _ => 0,
        };

        Self {
            name: path::join(dir, &raw.name),
            kind,
            size,
            facts: raw.facts.clone(),
        }
    }

    /// Fully-qualified path of the entry.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.name
    }

    /// Last path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self.name.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.name,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    /// Returns `true` if the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Returns `true` if the entry is a regular file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Size in bytes; zero for non-file kinds.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time, parsed from the `modify` fact
    /// (`YYYYMMDDHHMMSS`, UTC, fractional seconds dropped).
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        let fact = self.facts.get("modify")?;
        let fact = fact.split('.').next().unwrap_or(fact);
        NaiveDateTime::parse_from_str(fact, "%Y%m%d%H%M%S")
            .ok()
            .map(|time| time.and_utc())
    }

    /// Raw server-reported fact, e.g. `unix.mode`.
    #[must_use]
    pub fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod test_dir_entry {
    use super::*;

    fn listing(name: &str, facts: &[(&str, &str)]) -> ListingEntry {
        ListingEntry {
            name: name.to_owned(),
            facts: facts
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    #[test]
    fn test_file_entry() {
        let raw = listing(
            "a.bin",
            &[("type", "file"), ("size", "42"), ("modify", "20240506070809")],
        );
        let entry = DirEntry::from_listing("/data", &raw);

        assert_eq!(entry.path(), "/data/a.bin");
        assert_eq!(entry.file_name(), "a.bin");
        assert!(entry.is_file());
        assert_eq!(entry.size(), 42);

        let modified = entry.modified().unwrap();
        assert_eq!(modified.to_rfc3339(), "2024-05-06T07:08:09+00:00");
    }

    #[test]
    fn test_directory_size_forced_to_zero() {
        let raw = listing("sub", &[("type", "dir"), ("size", "4096")]);
        let entry = DirEntry::from_listing("/data", &raw);

        assert!(entry.is_dir());
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.fact("size"), Some("4096"));
    }

    #[test]
    fn test_unknown_kind() {
        let raw = listing("link", &[("type", "OS.unix=symlink")]);
        let entry = DirEntry::from_listing("/data", &raw);

        assert_eq!(
            entry.kind(),
            &FileKind::Other("OS.unix=symlink".to_owned())
        );
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.modified(), None);
    }
}
