use std::{
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, Layer};

static IS_TRACING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Crates whose events are enabled when `TRACE` is a plain level such as `TRACE=info`.
const HARVEST_TARGETS: &[&str] = &[
    "harvest",
    "harvest_cli",
    "harvest_dedup_cache",
    "harvest_fetcher",
    "harvest_registry",
    "harvest_tarball",
    "harvest_task_queue",
];

/// Install a global subscriber if the `TRACE` environment variable is set.
///
/// Calling this more than once is a no-op.
pub fn enable_tracing_by_env() {
    let Ok(trace_var) = std::env::var("TRACE") else {
        return;
    };

    if !IS_TRACING_ENABLED.swap(true, Ordering::SeqCst) {
        use tracing_subscriber::{fmt, prelude::*};
        let layer = common_layer(&trace_var);

        tracing_subscriber::registry()
            .with(layer)
            .with(fmt::layer().with_writer(std::io::stderr).with_span_events(FmtSpan::CLOSE))
            .init();
        tracing::trace!("enable_tracing_by_env");
    }
}

fn common_layer(trace_var: &str) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> {
    if let Ok(default_level) = Level::from_str(trace_var) {
        level_targets(default_level).boxed()
    } else {
        match EnvFilter::builder().with_regex(true).parse(trace_var) {
            Ok(filter) => filter.boxed(),
            Err(error) => {
                eprintln!("Ignoring invalid TRACE directive {trace_var:?}: {error}");
                level_targets(Level::INFO).boxed()
            }
        }
    }
}

fn level_targets(level: Level) -> tracing_subscriber::filter::Targets {
    tracing_subscriber::filter::Targets::new()
        .with_targets(HARVEST_TARGETS.iter().map(|target| (*target, level)))
}
