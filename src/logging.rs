//! Ambient tracing setup for the runtime. Every `#[instrument]` span and
//! `info!`/`warn!` call already scattered through the `shipwright-*` crates
//! only reaches a terminal once a subscriber is installed; this is the one
//! place that happens.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` if set; otherwise falls back to `shipwright=debug,info`
/// in verbose mode or `shipwright=info,warn` otherwise. Safe to call at most
/// once per process — a second call returns `Err` rather than panicking.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("shipwright=debug,info")
            } else {
                EnvFilter::try_new("shipwright=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
