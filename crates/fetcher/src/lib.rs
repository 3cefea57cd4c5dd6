mod fetch_failure;
mod fetch_packages;
mod package_specifier;

pub use fetch_failure::{FetchError, FetchFailure};
pub use fetch_packages::{FetchPackages, FetchReport};
pub use package_specifier::PackageSpecifier;
