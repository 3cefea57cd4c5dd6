use std::collections::HashMap;

use harvest_network::ThrottledClient;
use node_semver::{Range, Version};
use pipe_trait::Pipe;
use serde::{Deserialize, Serialize};

use crate::{PackageVersion, RegistryError, ResolveError, LATEST_TAG};

/// Registry document of a package, as served by `GET {registry}/{name}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Package {
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, PackageVersion>,
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Package {
    /// Fetch the metadata of `name`. `registry` must end with a slash.
    ///
    /// A single attempt is made; retrying is up to the caller.
    pub async fn fetch_from_registry(
        name: &str,
        http_client: &ThrottledClient,
        registry: &str,
    ) -> Result<Self, RegistryError> {
        let url = format!("{registry}{name}");
        tracing::debug!(target: "harvest::registry", ?url, "Fetch metadata");

        let (status, body) = http_client
            .run_with_permit(|client| {
                let request = client.get(&url).header("accept", "application/json");
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    let body = response.bytes().await?;
                    Ok::<_, reqwest::Error>((status, body))
                }
            })
            .await
            .map_err(|error| RegistryError::Request { url: url.clone(), error })?;

        if !status.is_success() {
            return Err(RegistryError::Status { url, status });
        }

        body.as_ref()
            .pipe(serde_json::from_slice::<Package>)
            .map_err(|error| RegistryError::ParseMetadata { url, error })
    }

    /// Version string bound to the `latest` dist-tag.
    pub fn latest_version(&self) -> Result<&str, ResolveError> {
        self.dist_tags
            .get(LATEST_TAG)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::MissingLatestTag { name: self.name.clone() })
    }

    /// Select the version to fetch for `version_range`.
    ///
    /// * An empty range selects `latest`.
    /// * A range that names a dist-tag selects the version bound to that tag.
    /// * Otherwise the highest version satisfying the range is selected. Pre-releases only
    ///   satisfy ranges that name a pre-release of the same `major.minor.patch`.
    /// * A range that matches nothing, or doesn't parse, falls back to `latest`. Large batches
    ///   must keep going when one package declares an impossible range.
    pub fn select_version(&self, version_range: &str) -> Result<&str, ResolveError> {
        let version_range = version_range.trim();
        if version_range.is_empty() {
            return self.latest_version();
        }

        if let Some(version) = self.dist_tags.get(version_range) {
            return Ok(version);
        }

        let range = match version_range.parse::<Range>() {
            Ok(range) => range,
            Err(error) => {
                tracing::debug!(target: "harvest::registry", name = ?self.name, ?version_range, %error, "Unparseable range, fall back to latest");
                return self.latest_version();
            }
        };

        let highest = self
            .versions
            .keys()
            .filter_map(|key| key.parse::<Version>().ok().map(|version| (version, key)))
            .filter(|(version, _)| version.satisfies(&range))
            .max_by(|(a, _), (b, _)| a.cmp(b));

        match highest {
            Some((_, key)) => Ok(key.as_str()),
            None => {
                tracing::debug!(target: "harvest::registry", name = ?self.name, ?version_range, "No version satisfies range, fall back to latest");
                self.latest_version()
            }
        }
    }

    /// Select a version and return its record.
    pub fn pinned_version(&self, version_range: &str) -> Result<&PackageVersion, ResolveError> {
        let version = self.select_version(version_range)?;
        self.versions.get(version).ok_or_else(|| ResolveError::MissingVersionRecord {
            name: self.name.clone(),
            version: version.to_string(),
        })
    }
}
