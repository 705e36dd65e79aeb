//! Logging setup.

/// Initializes the global logger.
///
/// `RUST_LOG` takes precedence; `level` is used when it is not set.
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .init();
}
