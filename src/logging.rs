use tracing_subscriber::EnvFilter;

/// Environment variable holding the developer log filter.
pub const LOG_ENV: &str = "CAFE_LOG";

/// Route developer logs to stderr so stdout stays protocol-only.
///
/// Debug builds default to `debug`, release builds to `warn`; `CAFE_LOG`
/// overrides either.
pub fn init() {
    let default = if cfg!(debug_assertions) { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[macro_export]
macro_rules! log_dev {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            tracing::debug!($($arg)*);
        }
    };
}
