//! Logging initialization.
//!
//! Console output is always on, filtered through `RUST_LOG` (default `info`).
//! Setting `CARD_INTEL_LOG_DIR` additionally writes daily-rotated files; the
//! non-blocking writer guard is parked globally so the file stays open for
//! the life of the process.

use std::sync::Mutex;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(true);

    match std::env::var("CARD_INTEL_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(&dir, "card-intel.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARDS.lock().expect("log guard mutex poisoned").push(guard);
            let file = fmt::layer().with_ansi(false).with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()?;
        }
    }
    Ok(())
}
