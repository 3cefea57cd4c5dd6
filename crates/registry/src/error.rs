use derive_more::{Display, Error};
use miette::Diagnostic;

/// Failure to obtain package metadata from the registry.
#[derive(Debug, Display, Error, Diagnostic)]
#[non_exhaustive]
pub enum RegistryError {
    #[display("Failed to request {url}: {error}")]
    #[diagnostic(code(harvest_registry::request))]
    Request {
        url: String,
        #[error(source)]
        error: reqwest::Error,
    },

    #[display("The registry responded with {status} for {url}")]
    #[diagnostic(code(harvest_registry::status))]
    Status {
        url: String,
        #[error(not(source))]
        status: reqwest::StatusCode,
    },

    #[display("Failed to parse the metadata from {url}: {error}")]
    #[diagnostic(code(harvest_registry::parse_metadata))]
    ParseMetadata {
        url: String,
        #[error(source)]
        error: serde_json::Error,
    },
}

/// Failure to map a version range onto a version record of a fetched package.
#[derive(Debug, Display, Error, Diagnostic)]
#[non_exhaustive]
pub enum ResolveError {
    #[display("Package {name} has no `latest` dist-tag")]
    #[diagnostic(code(harvest_registry::missing_latest_tag))]
    MissingLatestTag {
        #[error(not(source))]
        name: String,
    },

    #[display("Package {name} has no record for the selected version {version}")]
    #[diagnostic(code(harvest_registry::missing_version_record))]
    MissingVersionRecord {
        #[error(not(source))]
        name: String,
        #[error(not(source))]
        version: String,
    },
}
