use serde::{Deserialize, Serialize};

/// The `dist` field of a version record.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDistribution {
    pub tarball: String,
}
