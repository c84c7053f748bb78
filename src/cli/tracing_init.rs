//! Tracing/logging initialization for the CLI.

use tracing_subscriber::EnvFilter;

/// Initializes `tracing-subscriber` for phase/request logging. Verbosity is
/// driven by `-v`/`-vv` flags, falling back to `APIPROBER_LOG`; format (text
/// or JSON) by `APIPROBER_LOG_FORMAT`. Output always goes to stderr so stdout
/// stays reserved for the CLI's own result lines.
pub fn init_tracing(verbosity: u8) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let log_level = if verbosity > 0 {
        match verbosity {
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    } else {
        std::env::var("APIPROBER_LOG").unwrap_or_else(|_| "info".to_string())
    };

    let env_filter = EnvFilter::try_new(&log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_format = std::env::var("APIPROBER_LOG_FORMAT").map_or_else(|_| "text".to_string(), |s| s.to_lowercase());

    if log_format == "json" {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
    }
}
