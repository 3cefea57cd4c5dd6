use crate::{FetchError, FetchFailure, PackageSpecifier};
use harvest_config::Config;
use harvest_dedup_cache::DedupCache;
use harvest_network::ThrottledClient;
use harvest_registry::Package;
use harvest_reporter::ProgressReporter;
use harvest_tarball::{artifact_file_name, DownloadTarball};
use harvest_task_queue::TaskQueue;
use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

/// Outcome of [`FetchPackages::run`].
#[derive(Debug)]
pub struct FetchReport {
    /// Packages whose tarballs were claimed by this run.
    pub discovered: u64,
    /// Packages whose download attempt finished and whose dependencies were queued.
    pub completed: u64,
    /// Everything that went wrong, in the order it happened.
    pub failures: Vec<FetchFailure>,
}

/// This subroutine fetches the tarballs of the given packages and of their whole dependency
/// graph into `output_dir`.
///
/// **Brief overview for each package:**
/// * Fetch the metadata and select a version.
/// * Claim the identity of that version in the dedup cache, stop if it was already claimed.
/// * Download the tarball.
/// * Queue the runtime and peer dependencies of the version.
///
/// Seeds and discovered dependencies go through the same queue, whose worker count is
/// `config.fetch_concurrency`.
#[must_use]
pub struct FetchPackages<'a, Specifiers> {
    pub http_client: &'a ThrottledClient,
    pub config: &'static Config,
    pub dedup_cache: &'a DedupCache,
    pub reporter: &'a ProgressReporter,
    pub output_dir: &'a Path,
    pub specifiers: Specifiers,
}

impl<'a, Specifiers> FetchPackages<'a, Specifiers>
where
    Specifiers: IntoIterator<Item = PackageSpecifier>,
{
    /// Execute the subroutine.
    pub async fn run(self) -> FetchReport {
        let FetchPackages { http_client, config, dedup_cache, reporter, output_dir, specifiers } =
            self;

        let resolver = Resolver {
            http_client,
            config,
            dedup_cache,
            reporter,
            output_dir,
            failures: Mutex::default(),
        };

        let queue = TaskQueue::new(config.fetch_concurrency);
        for specifier in specifiers {
            queue.submit(specifier);
        }

        tracing::info!(target: "harvest::fetch", seeds = queue.outstanding(), "Start all");

        queue.drain(|specifier, queue| resolver.process(specifier, queue)).await;

        let counters = reporter.counters();
        let report = FetchReport {
            discovered: counters.discovered(),
            completed: counters.completed(),
            failures: resolver.failures.into_inner().unwrap_or_else(PoisonError::into_inner),
        };

        tracing::info!(target: "harvest::fetch", discovered = report.discovered, failures = report.failures.len(), "Complete all");

        report
    }
}

struct Resolver<'a> {
    http_client: &'a ThrottledClient,
    config: &'static Config,
    dedup_cache: &'a DedupCache,
    reporter: &'a ProgressReporter,
    output_dir: &'a Path,
    failures: Mutex<Vec<FetchFailure>>,
}

impl<'a> Resolver<'a> {
    async fn process(&self, specifier: PackageSpecifier, queue: &TaskQueue<PackageSpecifier>) {
        if let Err(error) = self.resolve(&specifier, queue).await {
            self.record(specifier, error);
        }
    }

    /// Resolve one package. Errors returned from here abort the package's subtree, download
    /// errors are recorded without aborting it.
    async fn resolve(
        &self,
        specifier: &PackageSpecifier,
        queue: &TaskQueue<PackageSpecifier>,
    ) -> Result<(), FetchError> {
        let Resolver { http_client, config, dedup_cache, reporter, output_dir, .. } = self;

        let package = Package::fetch_from_registry(&specifier.name, http_client, &config.registry)
            .await
            .map_err(FetchError::Metadata)?;
        let package_version =
            package.pinned_version(&specifier.range).map_err(FetchError::Resolve)?;

        let identity = package_version.identity();
        if !dedup_cache.claim(&identity) {
            tracing::debug!(target: "harvest::fetch", ?identity, "Skip claimed package");
            return Ok(());
        }

        reporter.discover(&specifier.name);

        let package_url = package_version.as_tarball_url();
        let file_path = output_dir.join(artifact_file_name(&config.registry, package_url));
        let download = DownloadTarball { http_client, package_url, file_path: &file_path };
        if let Err(error) = download.run().await {
            self.record(specifier.clone(), FetchError::Download(error));
        }

        for (name, range) in package_version.dependencies(true) {
            queue.submit(PackageSpecifier::from_dependency(name, range));
        }

        reporter.complete();

        Ok(())
    }

    fn record(&self, specifier: PackageSpecifier, error: FetchError) {
        tracing::warn!(target: "harvest::fetch", %specifier, %error, "Failed to fetch");
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FetchFailure { specifier, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_registry::RegistryError;
    use harvest_testing_utils::{
        fs::get_filenames_in_folder,
        registry::{
            metadata_mock, package_document, registry_url, tarball_mock, tarball_path,
            VersionFixture,
        },
    };
    use mockito::{Mock, ServerGuard};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const TARBALL: &[u8] = b"tarball bytes";

    struct Registry {
        server: ServerGuard,
        mocks: Vec<Mock>,
    }

    impl Registry {
        async fn new() -> Self {
            Registry { server: mockito::Server::new_async().await, mocks: Vec::new() }
        }

        fn url(&self) -> String {
            registry_url(&self.server)
        }

        /// Serve metadata of `name`, expected to be requested `metadata_hits` times, and the
        /// tarball of every version in `versions`, each expected `tarball_hits` times.
        async fn publish(
            &mut self,
            name: &str,
            latest: &str,
            versions: Vec<VersionFixture>,
            metadata_hits: usize,
            tarball_hits: usize,
        ) {
            let document = package_document(name, latest, versions.clone(), &self.url());
            let metadata = metadata_mock(&mut self.server, name, &document)
                .expect(metadata_hits)
                .create_async()
                .await;
            self.mocks.push(metadata);
            for fixture in versions {
                let tarball = tarball_mock(&mut self.server, name, &fixture.version, TARBALL)
                    .expect(tarball_hits)
                    .create_async()
                    .await;
                self.mocks.push(tarball);
            }
        }

        async fn assert(&self) {
            for mock in &self.mocks {
                mock.assert_async().await;
            }
        }
    }

    struct Run {
        report: FetchReport,
        dedup_cache: DedupCache,
        output_dir: TempDir,
    }

    async fn run(registry: &Registry, seeds: &[&str], dedup_cache: DedupCache) -> Run {
        let config = Config {
            registry: registry.url(),
            fetch_concurrency: 4,
            network_concurrency: 4,
            ..Config::default()
        }
        .leak();
        let http_client = ThrottledClient::new(4, Duration::from_secs(10)).unwrap();
        let output_dir = tempdir().unwrap();
        let report = FetchPackages {
            http_client: &http_client,
            config,
            dedup_cache: &dedup_cache,
            reporter: &ProgressReporter::hidden(),
            output_dir: output_dir.path(),
            specifiers: seeds.iter().copied().map(PackageSpecifier::parse),
        }
        .run()
        .await;
        Run { report, dedup_cache, output_dir }
    }

    #[tokio::test]
    async fn cyclic_dependencies_terminate() {
        let mut registry = Registry::new().await;
        registry
            .publish("a", "1.0.0", vec![VersionFixture::new("a", "1.0.0").dependency("b", "^1.0.0")], 2, 1)
            .await;
        registry
            .publish("b", "1.0.0", vec![VersionFixture::new("b", "1.0.0").dependency("a", "^1.0.0")], 1, 1)
            .await;

        let Run { report, dedup_cache, output_dir } = run(&registry, &["a"], DedupCache::new()).await;

        registry.assert().await;
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!((report.discovered, report.completed), (2, 2));
        assert_eq!(dedup_cache.to_sorted_vec(), ["a@1.0.0", "b@1.0.0"]);
        assert_eq!(get_filenames_in_folder(output_dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn shared_dependency_is_downloaded_once() {
        let mut registry = Registry::new().await;
        registry
            .publish("x", "1.0.0", vec![VersionFixture::new("x", "1.0.0").dependency("shared", "^1.0.0")], 1, 1)
            .await;
        registry
            .publish("y", "2.0.0", vec![VersionFixture::new("y", "2.0.0").dependency("shared", "1.x")], 1, 1)
            .await;
        registry.publish("shared", "1.1.0", vec![VersionFixture::new("shared", "1.1.0")], 2, 1).await;

        let Run { report, dedup_cache, .. } = run(&registry, &["x", "y"], DedupCache::new()).await;

        registry.assert().await;
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(dedup_cache.to_sorted_vec(), ["shared@1.1.0", "x@1.0.0", "y@2.0.0"]);
    }

    #[tokio::test]
    async fn highest_satisfying_version_is_downloaded() {
        let mut registry = Registry::new().await;
        let versions = ["1.0.0", "1.2.0", "2.0.0"];
        let document = package_document(
            "lib",
            "2.0.0",
            versions.iter().map(|version| VersionFixture::new("lib", version)),
            &registry.url(),
        );
        let _mock = metadata_mock(&mut registry.server, "lib", &document).create_async().await;
        let selected = tarball_mock(&mut registry.server, "lib", "1.2.0", TARBALL)
            .expect(1)
            .create_async()
            .await;
        let latest = tarball_mock(&mut registry.server, "lib", "2.0.0", TARBALL)
            .expect(0)
            .create_async()
            .await;

        let Run { report, dedup_cache, .. } = run(&registry, &["lib@^1.0.0"], DedupCache::new()).await;

        selected.assert_async().await;
        latest.assert_async().await;
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(dedup_cache.to_sorted_vec(), ["lib@1.2.0"]);
    }

    #[tokio::test]
    async fn metadata_failure_only_aborts_its_branch() {
        let mut registry = Registry::new().await;
        let _mock = registry.server.mock("GET", "/missing").with_status(404).expect(1).create_async().await;
        registry
            .publish("ok", "1.0.0", vec![VersionFixture::new("ok", "1.0.0").dependency("dep", "*")], 1, 1)
            .await;
        registry.publish("dep", "3.0.0", vec![VersionFixture::new("dep", "3.0.0")], 1, 1).await;

        let Run { report, dedup_cache, .. } =
            run(&registry, &["missing", "ok"], DedupCache::new()).await;

        registry.assert().await;
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.specifier, PackageSpecifier::parse("missing"));
        assert!(matches!(failure.error, FetchError::Metadata(RegistryError::Status { .. })));
        assert_eq!(dedup_cache.to_sorted_vec(), ["dep@3.0.0", "ok@1.0.0"]);
    }

    #[tokio::test]
    async fn download_failure_still_fetches_dependencies() {
        let mut registry = Registry::new().await;
        let document = package_document(
            "broken",
            "1.0.0",
            [VersionFixture::new("broken", "1.0.0").dependency("dep", "^3.0.0")],
            &registry.url(),
        );
        let _mock = metadata_mock(&mut registry.server, "broken", &document).create_async().await;
        let _mock = registry
            .server
            .mock("GET", tarball_path("broken", "1.0.0").as_str())
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        registry.publish("dep", "3.0.0", vec![VersionFixture::new("dep", "3.0.0")], 1, 1).await;

        let Run { report, dedup_cache, output_dir } =
            run(&registry, &["broken"], DedupCache::new()).await;

        registry.assert().await;
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, FetchError::Download(_)));
        assert_eq!(report.completed, 2);
        // claimed identities of failed downloads are kept so they aren't retried
        assert_eq!(dedup_cache.to_sorted_vec(), ["broken@1.0.0", "dep@3.0.0"]);
        assert_eq!(get_filenames_in_folder(output_dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn claimed_identity_skips_download_and_dependencies() {
        let mut registry = Registry::new().await;
        registry
            .publish("a", "1.0.0", vec![VersionFixture::new("a", "1.0.0").dependency("b", "^1.0.0")], 1, 0)
            .await;
        registry.publish("b", "1.0.0", vec![VersionFixture::new("b", "1.0.0")], 0, 0).await;
        let dedup_cache = ["a@1.0.0"].into_iter().collect::<DedupCache>();

        let Run { report, dedup_cache, output_dir } = run(&registry, &["a"], dedup_cache).await;

        registry.assert().await;
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.discovered, 0);
        assert_eq!(dedup_cache.to_sorted_vec(), ["a@1.0.0"]);
        assert!(get_filenames_in_folder(output_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn peer_and_aliased_dependencies_are_fetched() {
        let mut registry = Registry::new().await;
        registry
            .publish(
                "plugin",
                "1.0.0",
                vec![VersionFixture::new("plugin", "1.0.0")
                    .dependency("string-width-cjs", "npm:string-width@^4.2.0")
                    .peer_dependency("host", "^2.0.0")],
                1,
                1,
            )
            .await;
        let document = package_document(
            "string-width",
            "5.0.0",
            ["4.2.3", "5.0.0"].map(|version| VersionFixture::new("string-width", version)),
            &registry.url(),
        );
        let _mock = metadata_mock(&mut registry.server, "string-width", &document).create_async().await;
        let aliased = tarball_mock(&mut registry.server, "string-width", "4.2.3", TARBALL)
            .expect(1)
            .create_async()
            .await;
        let latest = tarball_mock(&mut registry.server, "string-width", "5.0.0", TARBALL)
            .expect(0)
            .create_async()
            .await;
        registry.publish("host", "2.1.0", vec![VersionFixture::new("host", "2.1.0")], 1, 1).await;

        let Run { report, dedup_cache, .. } = run(&registry, &["plugin"], DedupCache::new()).await;

        registry.assert().await;
        aliased.assert_async().await;
        latest.assert_async().await;
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(dedup_cache.to_sorted_vec(), ["host@2.1.0", "plugin@1.0.0", "string-width@4.2.3"]);
    }
}
