use derive_more::{Display, Error};
use harvest_config::Config;
use harvest_dedup_cache::{DedupCache, LoadCacheError};
use harvest_fetcher::PackageSpecifier;
use harvest_network::{BuildClientError, ThrottledClient};
use harvest_reporter::ProgressReporter;
use miette::Diagnostic;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Application state of a `harvest` run.
pub struct State {
    /// HTTP client to make HTTP requests.
    pub http_client: ThrottledClient,
    /// Configuration read from `.npmrc`.
    pub config: &'static Config,
    /// Identities claimed by previous runs, and by this one as it goes.
    pub dedup_cache: DedupCache,
    /// Progress bar on stderr.
    pub reporter: ProgressReporter,
    /// Directory that receives the tarballs.
    pub output_dir: PathBuf,
    /// Packages listed in the packages file.
    pub specifiers: Vec<PackageSpecifier>,
}

/// Error type of [`State::init`].
#[derive(Debug, Display, Error, Diagnostic)]
#[non_exhaustive]
pub enum InitStateError {
    #[display("Failed to read the packages file at {path:?}: {error}")]
    #[diagnostic(code(harvest_cli::read_packages_file))]
    ReadPackagesFile {
        path: PathBuf,
        #[error(source)]
        error: io::Error,
    },

    #[display("Failed to create the output directory at {path:?}: {error}")]
    #[diagnostic(code(harvest_cli::create_output_dir))]
    CreateOutputDir {
        path: PathBuf,
        #[error(source)]
        error: io::Error,
    },

    #[diagnostic(transparent)]
    LoadCache(#[error(source)] LoadCacheError),

    #[diagnostic(transparent)]
    BuildClient(#[error(source)] BuildClientError),
}

impl State {
    /// Initialize the application state.
    pub fn init(output_dir: PathBuf, config: &'static Config) -> Result<Self, InitStateError> {
        let specifiers = load_specifiers(&config.packages_file)?;

        fs::create_dir_all(&output_dir).map_err(|error| InitStateError::CreateOutputDir {
            path: output_dir.clone(),
            error,
        })?;

        Ok(State {
            http_client: ThrottledClient::new(config.network_concurrency, config.fetch_timeout())
                .map_err(InitStateError::BuildClient)?,
            dedup_cache: DedupCache::load(&config.cache_file).map_err(InitStateError::LoadCache)?,
            reporter: ProgressReporter::new(),
            config,
            output_dir,
            specifiers,
        })
    }
}

fn load_specifiers(path: &Path) -> Result<Vec<PackageSpecifier>, InitStateError> {
    let content = fs::read_to_string(path)
        .map_err(|error| InitStateError::ReadPackagesFile { path: path.to_path_buf(), error })?;
    let specifiers = parse_specifiers(&content);
    tracing::info!(target: "harvest::cli", ?path, count = specifiers.len(), "Loaded packages file");
    Ok(specifiers)
}

/// One specifier per non-blank line.
fn parse_specifiers(content: &str) -> Vec<PackageSpecifier> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PackageSpecifier::parse)
        .collect()
}
