//! Logging for test binaries.
//!
//! Every integration test binary installs this from a `ctor` hook, and unit
//! test modules may call it again; only the first call does anything.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Filter used when neither `TEST_LOG` nor `RUST_LOG` is set.
const QUIET: &str = "warn";

fn filter_directives() -> String {
    ["TEST_LOG", "RUST_LOG"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| QUIET.to_string())
}

/// Installs a compact subscriber that writes through the test harness, so
/// output only shows for failing tests or with `--nocapture`.
///
/// ```rust
/// test_support::logging::init();
/// test_support::logging::init();
/// tracing::info!("visible with TEST_LOG=info");
/// ```
pub fn init() {
    INSTALLED.get_or_init(|| {
        let directives = filter_directives();
        // Another subscriber may already be global; keep it.
        let installed = fmt()
            .with_env_filter(EnvFilter::new(&directives))
            .with_test_writer()
            .without_time()
            .compact()
            .try_init()
            .is_ok();
        tracing::debug!(filter = %directives, installed, "test logging ready");
    });
}
