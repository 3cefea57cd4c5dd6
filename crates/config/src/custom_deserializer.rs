use std::{env, path::PathBuf, str::FromStr};

use serde::{de, Deserialize, Deserializer};

pub fn default_registry() -> String {
    "https://registry.npmjs.org/".to_string()
}

pub fn default_network_concurrency() -> usize {
    harvest_network::default_permits()
}

/// Large on purpose: a worker spends nearly all of its time waiting for the network.
pub fn default_fetch_concurrency() -> usize {
    1200
}

/// Milliseconds.
pub fn default_fetch_timeout() -> u64 {
    60_000
}

pub fn default_packages_file() -> PathBuf {
    PathBuf::from("npm-packages.txt")
}

pub fn default_cache_file() -> PathBuf {
    PathBuf::from("npm-cache.json")
}

pub fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u64::from_str(s.trim()).map_err(de::Error::custom)
}

/// Concurrency limits must be at least 1.
pub fn deserialize_concurrency<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match usize::from_str(s.trim()).map_err(de::Error::custom)? {
        0 => Err(de::Error::custom("concurrency must be greater than 0")),
        value => Ok(value),
    }
}

pub fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let path = PathBuf::from_str(s.trim()).map_err(de::Error::custom)?;

    if path.is_absolute() {
        return Ok(path);
    }

    Ok(env::current_dir().map_err(de::Error::custom)?.join(path))
}

/// This deserializer adds a trailing "/" if not exist to make our life easier.
pub fn deserialize_registry<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();

    if s.ends_with('/') {
        return Ok(s.to_string());
    }

    Ok(format!("{s}/"))
}
