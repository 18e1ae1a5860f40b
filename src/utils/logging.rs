/// Initialize tracing/logging for the application.
///
/// This uses a simple `with_max_level` configuration based on `default_level`.
pub fn init(default_level: &str) {
    let lvl = parse_level(default_level);

    // Use try_init so tests and libraries can call this multiple times without panicking
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .try_init();
}

/// Maps a configured level name onto a `tracing::Level`, falling back to `INFO`.
pub fn parse_level(name: &str) -> tracing::Level {
    match name.trim().to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}
