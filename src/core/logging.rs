//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// planeta::core::logging::init();
/// log::info!("Planet geometry ready");
/// ```
pub fn init() {
    // try_init so tests and embedding applications can call this repeatedly
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
