mod custom_deserializer;

use serde::Deserialize;
use smart_default::SmartDefault;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::custom_deserializer::{
    default_cache_file, default_fetch_concurrency, default_fetch_timeout,
    default_network_concurrency, default_packages_file, default_registry,
    deserialize_concurrency, deserialize_pathbuf, deserialize_registry, deserialize_u64,
};

/// Settings read from `.npmrc`.
///
/// Keys that harvest doesn't know about are ignored, so an existing `.npmrc` can be reused as is.
#[derive(Debug, Deserialize, SmartDefault, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// The base URL of the npm package registry (trailing slash included).
    #[default(_code = "default_registry()")]
    #[serde(default = "default_registry", deserialize_with = "deserialize_registry")]
    pub registry: String,

    /// Maximum number of HTTP requests in flight, metadata and tarballs combined.
    #[default(_code = "default_network_concurrency()")]
    #[serde(default = "default_network_concurrency", deserialize_with = "deserialize_concurrency")]
    pub network_concurrency: usize,

    /// Number of workers resolving packages. Applies to the seed list and to every
    /// dependency discovered along the way.
    #[default(_code = "default_fetch_concurrency()")]
    #[serde(default = "default_fetch_concurrency", deserialize_with = "deserialize_concurrency")]
    pub fetch_concurrency: usize,

    /// Timeout of a single HTTP request in milliseconds, body included.
    #[default(_code = "default_fetch_timeout()")]
    #[serde(default = "default_fetch_timeout", deserialize_with = "deserialize_u64")]
    pub fetch_timeout: u64,

    /// Newline separated list of package specifiers to fetch.
    ///
    /// A relative path is resolved against the current directory, including when it comes from
    /// the `.npmrc` in the home directory.
    #[default(_code = "default_packages_file()")]
    #[serde(default = "default_packages_file", deserialize_with = "deserialize_pathbuf")]
    pub packages_file: PathBuf,

    /// Identities of packages claimed by previous runs. Relative paths resolve like
    /// `packages_file`.
    #[default(_code = "default_cache_file()")]
    #[serde(default = "default_cache_file", deserialize_with = "deserialize_pathbuf")]
    pub cache_file: PathBuf,
}

impl Config {
    /// Try loading `.npmrc` in the current directory, then in the home directory.
    /// If neither exists or can be parsed, return the default value.
    pub fn current<Error, CurrentDir, HomeDir, Default>(
        current_dir: CurrentDir,
        home_dir: HomeDir,
        default: Default,
    ) -> Self
    where
        CurrentDir: FnOnce() -> Result<PathBuf, Error>,
        HomeDir: FnOnce() -> Option<PathBuf>,
        Default: FnOnce() -> Config,
    {
        let load = |dir: PathBuf| -> Option<Config> {
            let path = dir.join(".npmrc");
            let content = fs::read_to_string(&path).ok()?;
            match serde_ini::from_str::<Config>(&content) {
                Ok(config) => Some(config),
                Err(error) => {
                    tracing::warn!(target: "harvest::config", ?path, %error, "Ignore invalid .npmrc");
                    None
                }
            }
        };

        current_dir()
            .ok()
            .and_then(load)
            .or_else(|| home_dir().and_then(load))
            .unwrap_or_else(default)
    }

    /// Per-request timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout)
    }

    /// Path of the `.npmrc` that [`Config::current`] would read from `dir`.
    pub fn file_in(dir: &Path) -> PathBuf {
        dir.join(".npmrc")
    }

    /// Persist the config for the lifetime of the program.
    pub fn leak(self) -> &'static mut Self {
        Box::leak(Box::new(self))
    }
}
