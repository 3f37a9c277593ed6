//! Installation of the `tracing` subscriber.
//!
//! The library only emits events; binaries and applications call [`init_logger`] once.
//! `RUST_LOG` takes precedence over the configured level.
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Install a global subscriber writing to stderr.
///
/// Arguments
/// -----------------
/// * `level`: default filter directive when `RUST_LOG` is unset (`"info"`, `"cometprop=debug"`, ...).
/// * `json`: one JSON object per event instead of the compact text format.
///
/// Return
/// ----------
/// * `false` if a global subscriber was already installed (the call is then a no-op).
pub fn init_logger(level: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        registry.with(fmt_layer.json()).try_init().is_ok()
    } else {
        registry.with(fmt_layer.compact()).try_init().is_ok()
    }
}

/// [`init_logger`] from the `[logging]` section.
pub fn init_from_settings(settings: &LoggingSettings) -> bool {
    init_logger(&settings.level, settings.json)
}
