use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls the filter, defaulting to `info`. Production runs
/// want machine-readable output, so `json` switches the format; local runs
/// get the pretty human layout. Safe to call more than once (tests); only
/// the first call wins.
pub fn init_tracing(json: bool) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            // Span-close events carry the elapsed time for instrumented work.
            .with_span_events(fmt::format::FmtSpan::CLOSE);

        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry.with(layer.json()).init();
        } else {
            registry.with(layer.pretty()).init();
        }
    });
}

/// Awaits `fut`, logging a warning when it takes longer than `max`.
///
/// Wrapped around cache I/O and other calls that should be fast; a slow one
/// is worth knowing about but never worth failing over.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;

    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = max.as_millis() as u64,
            "slow operation detected"
        );
    }

    out
}
