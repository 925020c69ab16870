use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "image_service=info,info,sqlx=warn,rdkafka=warn";

/// Install the global subscriber; `LOG_FORMAT=json` selects JSON lines
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(false).init();
    }
}
