//! Remote path helpers. Paths are plain `/`-separated strings,
//! independent of the local platform.

/// Strips trailing separators. `"/"` normalizes to the empty string,
/// which is the cache key of the server root.
pub(crate) fn normalize(path: &str) -> String {
    path.trim_end_matches('/').to_owned()
}

/// Everything before the last separator. A bare name without a
/// separator is its own parent.
pub(crate) fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => path,
    }
}

/// Joins a directory and a child name with a single separator.
pub(crate) fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir, name)
}
