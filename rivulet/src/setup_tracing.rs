use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt};

use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

const ENV_DEBUG: &str = "RIVULET_DEBUG";

/// Panic hook to send panic info to `tracing` instead of stderr, so a panic that escapes the
/// library ends up on one line next to the rest of the logs.
fn report_panic(panic_info: &PanicHookInfo<'_>) {
    // noop if the RUST_BACKTRACE or RUST_LIB_BACKTRACE backtrace variables are both not set
    let backtrace = Backtrace::capture();
    let backtrace_captured = backtrace.status() == BacktraceStatus::Captured;
    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        Some(*s)
    } else {
        panic_info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
    };

    match (panic_info.location(), payload, backtrace_captured) {
        (Some(location), Some(payload), false) => {
            tracing::error!(
                "{}:{}:{}: {}",
                location.file(),
                location.line(),
                location.column(),
                payload,
            );
        }
        _ => {
            tracing::error!("{}\n{}", panic_info, backtrace);
        }
    };
}

fn debug_mode() -> bool {
    std::env::var(ENV_DEBUG).is_ok_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Filter used when RUST_LOG is not set. Debug mode only turns up our own crates, the runtime
/// stays at `info`.
fn default_directives(debug_mode: bool) -> &'static str {
    if debug_mode {
        "info,rivulet=debug,rivulet_core=debug"
    } else {
        "info"
    }
}

pub fn register() {
    let debug_mode = debug_mode();

    // RUST_LOG wins over the defaults
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(debug_mode)))
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));

    let layer = if debug_mode {
        // Text format
        fmt::layer().boxed()
    } else {
        // JSON format, flattened
        fmt::layer()
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .init();

    std::panic::set_hook(Box::new(report_panic));
}
