use dashmap::DashSet;
use derive_more::{Display, Error};
use miette::Diagnostic;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Error type of [`DedupCache::load`].
#[derive(Debug, Display, Error, Diagnostic)]
#[display("Failed to read the cache file at {path:?}: {error}")]
#[diagnostic(code(harvest_dedup_cache::load))]
pub struct LoadCacheError {
    pub path: PathBuf,
    #[error(source)]
    pub error: io::Error,
}

/// Error type of [`DedupCache::save`].
#[derive(Debug, Display, Error, Diagnostic)]
#[display("Failed to write the cache file at {path:?}: {error}")]
#[diagnostic(code(harvest_dedup_cache::save))]
pub struct SaveCacheError {
    pub path: PathBuf,
    #[error(source)]
    pub error: io::Error,
}

/// Set of package identities that have been claimed for download.
///
/// An identity is claimed before its download starts, not after it completes, so two
/// resolutions of the same package racing each other never both download it.
#[derive(Debug, Default)]
pub struct DedupCache {
    claimed: DashSet<String>,
}

impl DedupCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        DedupCache::default()
    }

    /// Load identities from a newline separated file. A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, LoadCacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::info!(target: "harvest::cache", ?path, "No cache file, start empty");
                return Ok(DedupCache::new());
            }
            Err(error) => return Err(LoadCacheError { path: path.to_path_buf(), error }),
        };

        let cache = content.lines().collect::<DedupCache>();
        tracing::info!(target: "harvest::cache", ?path, count = cache.len(), "Loaded cache");
        Ok(cache)
    }

    /// Overwrite `path` with the claimed identities, sorted, one per line.
    pub fn save(&self, path: &Path) -> Result<(), SaveCacheError> {
        let content = self.to_sorted_vec().join("\n");
        fs::write(path, content)
            .map_err(|error| SaveCacheError { path: path.to_path_buf(), error })?;
        tracing::info!(target: "harvest::cache", ?path, count = self.len(), "Saved cache");
        Ok(())
    }

    /// Whether `identity` has been claimed.
    pub fn contains(&self, identity: &str) -> bool {
        self.claimed.contains(identity)
    }

    /// Claim `identity`. Returns `true` if the caller is the first to claim it and
    /// should therefore download it.
    ///
    /// Check and insert happen as one atomic step.
    pub fn claim(&self, identity: &str) -> bool {
        self.claimed.insert(identity.to_string())
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Claimed identities in lexicographic order.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut identities =
            self.claimed.iter().map(|identity| identity.key().clone()).collect::<Vec<_>>();
        identities.sort();
        identities
    }
}

impl<'a> FromIterator<&'a str> for DedupCache {
    fn from_iter<Iter: IntoIterator<Item = &'a str>>(iter: Iter) -> Self {
        let claimed = iter
            .into_iter()
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .map(str::to_string)
            .collect();
        DedupCache { claimed }
    }
}
