use derive_more::{Display, Error};
use miette::Diagnostic;
use pipe_trait::Pipe;
use reqwest::Client;
use std::{future::IntoFuture, time::Duration};
use tokio::sync::{Semaphore, SemaphorePermit};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("harvest/", env!("CARGO_PKG_VERSION"));

/// Minimum number of concurrent requests when the limit is derived from the CPU count.
const MIN_PERMITS: usize = 16;

/// Error type of [`ThrottledClient::new`].
#[derive(Debug, Display, Error, Diagnostic)]
#[display("Failed to build the HTTP client: {_0}")]
#[diagnostic(code(harvest_network::build_client))]
pub struct BuildClientError(#[error(source)] pub reqwest::Error);

/// Wrapper around [`Client`] with concurrent request limit enforced by the [`Semaphore`] mechanism.
#[derive(Debug)]
pub struct ThrottledClient {
    semaphore: Semaphore,
    client: Client,
}

impl ThrottledClient {
    /// Construct a client that allows at most `permits` requests in flight, each one bounded
    /// by `timeout` from connection to the end of the response body.
    pub fn new(permits: usize, timeout: Duration) -> Result<Self, BuildClientError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(BuildClientError)?;
        let semaphore = permits.max(1).pipe(Semaphore::new);
        Ok(ThrottledClient { semaphore, client })
    }

    /// Acquire a permit and run `proc` with the underlying [`Client`].
    pub async fn run_with_permit<Proc, ProcFuture>(&self, proc: Proc) -> ProcFuture::Output
    where
        Proc: FnOnce(&Client) -> ProcFuture,
        ProcFuture: IntoFuture,
    {
        let (permit, client) = self.acquire().await;
        let result = proc(client).await;
        drop(permit);
        result
    }

    /// Acquire a permit for work that outlives a single future, such as streaming a
    /// response body. The request slot is released when the permit is dropped.
    pub async fn acquire(&self) -> (SemaphorePermit<'_>, &Client) {
        let permit =
            self.semaphore.acquire().await.expect("semaphore shouldn't have been closed this soon");
        (permit, &self.client)
    }

    /// Number of requests that may still start without waiting.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Default request limit: the number of CPUs, but never less than 16.
pub fn default_permits() -> usize {
    num_cpus::get().max(MIN_PERMITS)
}
