use crate::state::State;
use clap::Parser;
use harvest_config::Config;
use harvest_fetcher::{FetchFailure, FetchPackages, FetchReport};
use miette::Context;
use std::{env, path::PathBuf};

/// Download the tarballs of npm packages and of all their dependencies.
///
/// Packages are read from the packages file, one specifier per line. Identities of downloaded
/// packages are remembered in the cache file so later runs skip them.
#[derive(Debug, Parser)]
#[clap(name = "harvest")]
#[clap(bin_name = "harvest")]
#[clap(version)]
pub struct CliArgs {
    /// Directory that receives the tarballs.
    #[clap(default_value = "package-tar")]
    pub output_dir: PathBuf,
}

impl CliArgs {
    /// Execute the command
    pub async fn run(self) -> miette::Result<()> {
        let CliArgs { output_dir } = self;
        let config = Config::current(env::current_dir, home::home_dir, Config::default).leak();
        let State { http_client, config, dedup_cache, reporter, output_dir, specifiers } =
            State::init(output_dir, config).wrap_err("initialize the state")?;

        let FetchReport { discovered, failures, .. } = FetchPackages {
            http_client: &http_client,
            config,
            dedup_cache: &dedup_cache,
            reporter: &reporter,
            output_dir: &output_dir,
            specifiers,
        }
        .run()
        .await;

        reporter.finish();

        dedup_cache.save(&config.cache_file).wrap_err("flush the cache")?;

        tracing::info!(target: "harvest::cli", discovered, failures = failures.len(), "Done");
        if let Some(summary) = failure_summary(&failures) {
            eprintln!("{summary}");
        }

        Ok(())
    }
}

fn failure_summary(failures: &[FetchFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    for failure in failures {
        tracing::error!(target: "harvest::cli", %failure, "Failed");
    }
    let names = failures
        .iter()
        .map(|failure| failure.specifier.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("Failed to fetch {names}"))
}
