mod error;
mod package;
mod package_distribution;
mod package_version;

pub use error::{RegistryError, ResolveError};
pub use package::Package;
pub use package_distribution::PackageDistribution;
pub use package_version::PackageVersion;

/// Name of the dist-tag that every published package carries.
pub const LATEST_TAG: &str = "latest";
