pub fn logs_are_json() -> bool {
    matches!(std::env::var("FOODGRAM_LOG_FORMAT").as_deref(), Ok("json"))
}

/// Initialize tracing from `RUST_LOG` (default `info`) and `FOODGRAM_LOG_FORMAT`.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let builder = tracing_subscriber::registry().with(filter);

    if logs_are_json() {
        let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
    } else {
        let _ = builder.with(fmt_layer.compact()).try_init();
    }
}
