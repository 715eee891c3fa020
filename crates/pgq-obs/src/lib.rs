use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when RUST_LOG is not set
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Initialize logging.
/// - JSON logs
/// - RUST_LOG respected; otherwise "info", or "debug" when `debug` is set
pub fn init(service_name: &str, debug: bool) {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(debug).to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let debug_enabled = debug;
    tracing::info!(service = %service_name, debug = debug_enabled, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_selects_filter() {
        assert_eq!(default_filter(false), "info");
        assert_eq!(default_filter(true), "debug");
    }
}
