//! Builders of registry documents for tests backed by [`mockito`].

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Map, Value};

/// One published version of a fixture package.
#[derive(Debug, Clone)]
pub struct VersionFixture {
    pub name: String,
    pub version: String,
    pub dependencies: Vec<(String, String)>,
    pub peer_dependencies: Vec<(String, String)>,
}

impl VersionFixture {
    pub fn new(name: &str, version: &str) -> Self {
        VersionFixture {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: Vec::new(),
            peer_dependencies: Vec::new(),
        }
    }

    pub fn dependency(mut self, name: &str, range: &str) -> Self {
        self.dependencies.push((name.to_string(), range.to_string()));
        self
    }

    pub fn peer_dependency(mut self, name: &str, range: &str) -> Self {
        self.peer_dependencies.push((name.to_string(), range.to_string()));
        self
    }

    fn to_json(&self, registry: &str) -> Value {
        let map = |entries: &[(String, String)]| {
            entries
                .iter()
                .map(|(name, range)| (name.clone(), Value::String(range.clone())))
                .collect::<Map<_, _>>()
        };
        let tarball = tarball_url(registry, &self.name, &self.version);
        json!({
            "_id": format!("{}@{}", self.name, self.version),
            "name": self.name,
            "version": self.version,
            "dist": { "tarball": tarball },
            "dependencies": map(&self.dependencies),
            "peerDependencies": map(&self.peer_dependencies),
        })
    }
}

/// Tarball URL the way the npm registry lays them out. `registry` must end with a slash.
pub fn tarball_url(registry: &str, name: &str, version: &str) -> String {
    let basename = name.rsplit('/').next().unwrap_or(name);
    format!("{registry}{name}/-/{basename}-{version}.tgz")
}

/// Path component of [`tarball_url`], suitable for [`ServerGuard::mock`].
pub fn tarball_path(name: &str, version: &str) -> String {
    tarball_url("/", name, version)
}

/// Build the metadata document of `name`.
pub fn package_document<Versions>(
    name: &str,
    latest: &str,
    versions: Versions,
    registry: &str,
) -> Value
where
    Versions: IntoIterator<Item = VersionFixture>,
{
    let versions = versions
        .into_iter()
        .map(|fixture| (fixture.version.clone(), fixture.to_json(registry)))
        .collect::<Map<_, _>>();
    json!({
        "name": name,
        "dist-tags": { "latest": latest },
        "versions": versions,
    })
}

/// Registry base URL of a mock server, trailing slash included.
pub fn registry_url(server: &ServerGuard) -> String {
    format!("{}/", server.url())
}

/// Serve `document` as the metadata of `name`. Call `create` or `create_async` on the result.
pub fn metadata_mock(server: &mut ServerGuard, name: &str, document: &Value) -> Mock {
    server
        .mock("GET", Matcher::Exact(format!("/{name}")))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(document.to_string())
}

/// Serve `body` as the tarball of `name@version`. Call `create` or `create_async` on the result.
pub fn tarball_mock(server: &mut ServerGuard, name: &str, version: &str, body: &[u8]) -> Mock {
    server
        .mock("GET", Matcher::Exact(tarball_path(name, version)))
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body(body)
}
