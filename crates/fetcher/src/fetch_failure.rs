use crate::PackageSpecifier;
use derive_more::{Display, Error};
use harvest_registry::{RegistryError, ResolveError};
use harvest_tarball::TarballError;
use miette::Diagnostic;

/// Reason a package couldn't be fetched.
#[derive(Debug, Display, Error, Diagnostic)]
#[non_exhaustive]
pub enum FetchError {
    /// The metadata couldn't be fetched; the package's subtree is skipped.
    #[diagnostic(transparent)]
    Metadata(#[error(source)] RegistryError),

    /// No version record could be selected; the package's subtree is skipped.
    #[diagnostic(transparent)]
    Resolve(#[error(source)] ResolveError),

    /// The tarball couldn't be saved; the package's dependencies are still fetched.
    #[diagnostic(transparent)]
    Download(#[error(source)] TarballError),
}

/// A failure recorded during a run.
#[derive(Debug, Display, Error, Diagnostic)]
#[display("{specifier}: {error}")]
pub struct FetchFailure {
    #[error(not(source))]
    pub specifier: PackageSpecifier,
    #[error(source)]
    #[diagnostic_source]
    pub error: FetchError,
}
