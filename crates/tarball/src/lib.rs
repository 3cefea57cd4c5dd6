mod file_name;

pub use file_name::artifact_file_name;

use std::{
    io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use futures_util::{Stream, StreamExt};
use harvest_network::ThrottledClient;
use miette::Diagnostic;
use reqwest::{Client, StatusCode};
use tokio::{fs::File, io::AsyncWriteExt};

#[derive(Debug, Display, Error, Diagnostic)]
#[display("Failed to fetch {url}: {error}")]
pub struct NetworkError {
    pub url: String,
    pub error: reqwest::Error,
}

#[derive(Debug, Display, Error, From, Diagnostic)]
#[non_exhaustive]
pub enum TarballError {
    #[diagnostic(code(harvest_tarball::fetch_tarball))]
    FetchTarball(NetworkError),

    #[from(ignore)]
    #[display("The registry responded with {status} for {url}")]
    #[diagnostic(code(harvest_tarball::status))]
    Status {
        url: String,
        #[error(not(source))]
        status: StatusCode,
    },

    #[from(ignore)]
    #[display("Failed to read the body of {url}: {error}")]
    #[diagnostic(code(harvest_tarball::read_body))]
    ReadBody {
        url: String,
        #[error(source)]
        error: reqwest::Error,
    },

    #[from(ignore)]
    #[display("Failed to create file at {path:?}: {error}")]
    #[diagnostic(code(harvest_tarball::create_file))]
    CreateFile {
        path: PathBuf,
        #[error(source)]
        error: io::Error,
    },

    #[from(ignore)]
    #[display("Failed to write to file at {path:?}: {error}")]
    #[diagnostic(code(harvest_tarball::write_file))]
    WriteFile {
        path: PathBuf,
        #[error(source)]
        error: io::Error,
    },

    #[from(ignore)]
    #[display("Failed to move {from:?} to {to:?}: {error}")]
    #[diagnostic(code(harvest_tarball::rename_file))]
    RenameFile {
        from: PathBuf,
        to: PathBuf,
        #[error(source)]
        error: io::Error,
    },
}

/// Issue a `GET` for `url` and return the response body as a stream of chunks.
///
/// Non-success statuses are reported as [`TarballError::Status`] without reading the body.
pub async fn fetch_tarball_stream(
    client: &Client,
    url: &str,
) -> Result<impl Stream<Item = Result<impl AsRef<[u8]>, reqwest::Error>>, TarballError> {
    let response = client.get(url).send().await.map_err(|error| NetworkError {
        url: url.to_string(),
        error,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TarballError::Status { url: url.to_string(), status });
    }

    Ok(response.bytes_stream())
}

/// Path the tarball is streamed into before it is moved to its final name.
fn download_path(file_path: &Path) -> PathBuf {
    let mut file_name = file_path.file_name().unwrap_or_default().to_os_string();
    file_name.push(".download");
    file_path.with_file_name(file_name)
}

/// This subroutine streams a tarball to a file.
///
/// The file only appears at `file_path` once the whole body has been written, so a failed
/// download never leaves a truncated artifact behind.
#[must_use]
pub struct DownloadTarball<'a> {
    /// HTTP client to make HTTP requests.
    pub http_client: &'a ThrottledClient,
    /// URL to the tarball.
    pub package_url: &'a str,
    /// Destination of the tarball.
    pub file_path: &'a Path,
}

impl<'a> DownloadTarball<'a> {
    /// Execute the subroutine. Returns the number of bytes written.
    pub async fn run(self) -> Result<u64, TarballError> {
        let DownloadTarball { http_client, package_url, file_path } = self;

        // the permit is held until the body is fully written to bound the number of open sockets
        let (permit, client) = http_client.acquire().await;

        tracing::info!(target: "harvest::download", ?package_url, "Start download");

        let stream = fetch_tarball_stream(client, package_url).await?;
        let temp_path = download_path(file_path);
        let file = File::create(&temp_path)
            .await
            .map_err(|error| TarballError::CreateFile { path: temp_path.clone(), error })?;

        let size = match write_stream(package_url, &temp_path, stream, file).await {
            Ok(size) => size,
            Err(error) => {
                remove_partial_download(&temp_path).await;
                return Err(error);
            }
        };

        drop(permit);

        if let Err(error) = tokio::fs::rename(&temp_path, file_path).await {
            remove_partial_download(&temp_path).await;
            return Err(TarballError::RenameFile {
                from: temp_path,
                to: file_path.to_path_buf(),
                error,
            });
        }

        tracing::info!(target: "harvest::download", ?package_url, ?file_path, size, "Download completed");

        Ok(size)
    }
}

async fn remove_partial_download(temp_path: &Path) {
    if let Err(remove_error) = tokio::fs::remove_file(temp_path).await {
        tracing::warn!(target: "harvest::download", ?temp_path, %remove_error, "Failed to remove partial download");
    }
}

async fn write_stream<Chunk>(
    package_url: &str,
    path: &Path,
    stream: impl Stream<Item = Result<Chunk, reqwest::Error>>,
    mut file: File,
) -> Result<u64, TarballError>
where
    Chunk: AsRef<[u8]>,
{
    let write_error = |error| TarballError::WriteFile { path: path.to_path_buf(), error };
    let mut stream = std::pin::pin!(stream);
    let mut size = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|error| TarballError::ReadBody { url: package_url.to_string(), error })?;
        let chunk = chunk.as_ref();
        file.write_all(chunk).await.map_err(write_error)?;
        size += chunk.len() as u64;
    }

    file.flush().await.map_err(write_error)?;
    Ok(size)
}
