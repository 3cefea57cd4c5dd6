use harvest_diagnostics::Result;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> Result<()> {
    harvest_cli::main().await
}
