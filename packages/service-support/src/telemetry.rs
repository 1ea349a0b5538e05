use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "info,actix_web=info,reqwest=warn";

/// `LOG_FORMAT=pretty` switches the service binaries to human-readable logs.
const FORMAT_VAR: &str = "LOG_FORMAT";

fn fmt_layer(pretty: bool) -> Box<dyn Layer<Registry> + Send + Sync> {
    if pretty {
        fmt::layer().with_target(false).compact().boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    }
}

/// Installs the subscriber used by every service binary: JSON lines that
/// carry the enclosing `request` span, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let pretty = std::env::var(FORMAT_VAR).is_ok_and(|v| v.eq_ignore_ascii_case("pretty"));
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(fmt_layer(pretty))
        .with(env_filter)
        .init();
}
