use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::package_distribution::PackageDistribution;

/// One entry of the `versions` map of a registry document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    /// Registry-assigned identity, e.g. `lodash@4.17.21`.
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub name: String,
    pub version: String,
    pub dist: PackageDistribution,
    pub dependencies: Option<HashMap<String, String>>,
    #[serde(alias = "peerDependencies")]
    pub peer_dependencies: Option<HashMap<String, String>>,
}

impl PackageVersion {
    /// The identity used to deduplicate downloads.
    ///
    /// Falls back to `{name}@{version}` for documents without `_id`.
    pub fn identity(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{0}@{1}", self.name, self.version),
        }
    }

    pub fn as_tarball_url(&self) -> &str {
        self.dist.tarball.as_str()
    }

    /// Dependencies to recurse into, keyed by name.
    ///
    /// With `with_peer_dependencies`, peer dependencies are merged in as if they were runtime
    /// dependencies. A name listed in both maps takes the peer range.
    pub fn dependencies(&self, with_peer_dependencies: bool) -> HashMap<&str, &str> {
        let mut dependencies = HashMap::<&str, &str>::new();

        if let Some(deps) = self.dependencies.as_ref() {
            for (name, range) in deps {
                dependencies.insert(name.as_str(), range.as_str());
            }
        }

        if with_peer_dependencies {
            if let Some(deps) = self.peer_dependencies.as_ref() {
                for (name, range) in deps {
                    dependencies.insert(name.as_str(), range.as_str());
                }
            }
        }

        dependencies
    }
}
