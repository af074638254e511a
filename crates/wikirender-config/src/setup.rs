//! Setup entry point: a one-shot pass that fills in a configuration.
//!
//! A setup receives a mutable configuration seeded with defaults (or a
//! loaded base), assigns the options it cares about and registers endpoints.
//! The caller gets the populated value back and only reads it afterwards.

use crate::{ConfigError, ServiceConfiguration};
use log::debug;

/// A configuration pass run once at startup.
///
/// Implemented for closures, so a setup is usually written inline:
///
/// ```
/// use wikirender_config::{ConfigError, CorsPolicy, ServiceConfiguration, configure};
///
/// let config = configure(&|config: &mut ServiceConfiguration| -> Result<(), ConfigError> {
///     config.register_endpoint("http://localhost/api.php", "fr.example.org", "fr_example")?;
///     config.cors_policy = CorsPolicy::Disabled;
///     config.require_valid_ssl = false;
///     Ok(())
/// })
/// .expect("config");
/// assert_eq!(config.endpoints()[0].prefix.as_deref(), Some("fr_example"));
/// ```
pub trait ConfigSetup {
    /// Assign options on `config` in place.
    fn setup(&self, config: &mut ServiceConfiguration) -> Result<(), ConfigError>;
}

impl<F> ConfigSetup for F
where
    F: Fn(&mut ServiceConfiguration) -> Result<(), ConfigError>,
{
    fn setup(&self, config: &mut ServiceConfiguration) -> Result<(), ConfigError> {
        self(config)
    }
}

/// Run `setup` against the default configuration.
pub fn configure(setup: &impl ConfigSetup) -> Result<ServiceConfiguration, ConfigError> {
    ServiceConfiguration::default().with_setup(setup)
}

impl ServiceConfiguration {
    /// Run `setup` against this configuration and return the result.
    ///
    /// Completeness is not checked; see [`ServiceConfiguration::ensure_usable`].
    pub fn with_setup(mut self, setup: &impl ConfigSetup) -> Result<Self, ConfigError> {
        let before = self.endpoints().len();
        setup.setup(&mut self)?;
        debug!(
            "setup applied (endpoints_added={}, total_endpoints={})",
            self.endpoints().len() - before,
            self.endpoints().len()
        );
        Ok(self)
    }
}
