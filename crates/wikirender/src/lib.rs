//! Public surface for wikirender.
//!
//! Re-exports the configuration crate and provides a logging helper so that
//! embedding services set up logging the same way as the CLI.

/// Re-export for convenience.
pub use wikirender_config as config;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
