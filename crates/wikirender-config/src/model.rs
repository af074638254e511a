//! Configuration schema for the rendering service.

use crate::error::{ConfigError, ValidationError};
use crate::wikis;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

/// Port the listener binds when none is configured.
pub const DEFAULT_SERVER_PORT: i64 = 8000;
/// Interface the listener binds when none is configured.
pub const DEFAULT_SERVER_INTERFACE: &str = "0.0.0.0";

/// Root configuration handed to the rendering service.
///
/// Built once at startup (see [`crate::configure`] and the loaders) and only
/// read afterwards. Endpoints are reachable through [`Self::endpoints`] so
/// that every entry has passed registration checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    endpoints: Vec<EndpointRegistration>,
    /// Proxy used for endpoints that do not configure their own.
    #[serde(default)]
    pub default_proxy_uri: Option<String>,
    #[serde(default)]
    pub debug: bool,
    /// Expand templates through the remote API preprocessor.
    #[serde(default = "default_true")]
    pub use_preprocessor: bool,
    #[serde(default)]
    pub use_selective_serialization: bool,
    #[serde(default)]
    pub cors_policy: CorsPolicy,
    /// Listener port. Any integer is kept; [`Self::listen_addr`] checks the range.
    #[serde(default)]
    pub server_port: Option<i64>,
    #[serde(default)]
    pub server_interface: Option<String>,
    /// Outbound URL lint results are posted to.
    #[serde(default)]
    pub lint_api_endpoint: Option<String>,
    /// Verify certificate chains on outbound HTTPS calls.
    #[serde(default = "default_true")]
    pub require_valid_ssl: bool,
    /// Resolve well-known public wiki prefixes without registration.
    #[serde(default = "default_true")]
    pub predefined_wikis: bool,
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self {
            schema: None,
            endpoints: Vec::new(),
            default_proxy_uri: None,
            debug: false,
            use_preprocessor: true,
            use_selective_serialization: false,
            cors_policy: CorsPolicy::default(),
            server_port: None,
            server_interface: None,
            lint_api_endpoint: None,
            require_valid_ssl: true,
            predefined_wikis: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ServiceConfiguration {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ServiceConfigurationBuilder {
        ServiceConfigurationBuilder::new()
    }

    /// Registered endpoints in insertion order.
    pub fn endpoints(&self) -> &[EndpointRegistration] {
        &self.endpoints
    }

    /// Register an endpoint from its parts. An empty `prefix` registers no alias.
    pub fn register_endpoint(
        &mut self,
        uri: impl Into<String>,
        domain: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<&EndpointRegistration, ValidationError> {
        let registration = EndpointRegistration::new(uri, domain).with_prefix(prefix);
        self.register(registration)
    }

    /// Append a registration after checking it against the existing entries.
    ///
    /// On error the endpoint list is left untouched.
    pub fn register(
        &mut self,
        mut registration: EndpointRegistration,
    ) -> Result<&EndpointRegistration, ValidationError> {
        if registration.prefix.as_deref() == Some("") {
            registration.prefix = None;
        }
        if registration.uri.is_empty() {
            return Err(ValidationError::EmptyUri);
        }
        if registration.domain.is_empty() {
            return Err(ValidationError::EmptyDomain {
                uri: registration.uri,
            });
        }
        if let Some(prefix) = registration.prefix.as_deref() {
            if self.endpoint_by_prefix(prefix).is_some() {
                return Err(ValidationError::DuplicatePrefix {
                    prefix: prefix.to_string(),
                });
            }
        }

        debug!(
            "registered endpoint (uri={}, domain={}, prefix={:?})",
            registration.uri, registration.domain, registration.prefix
        );
        self.endpoints.push(registration);
        let index = self.endpoints.len() - 1;
        Ok(&self.endpoints[index])
    }

    /// Re-check endpoints that did not go through [`Self::register`], e.g. decoded ones.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checked = ServiceConfiguration::default();
        for endpoint in &self.endpoints {
            checked.register(endpoint.clone())?;
        }
        Ok(())
    }

    /// First registered endpoint.
    pub fn default_endpoint(&self) -> Option<&EndpointRegistration> {
        self.endpoints.first()
    }

    /// Look up a registered endpoint by its alias.
    pub fn endpoint_by_prefix(&self, prefix: &str) -> Option<&EndpointRegistration> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.prefix.as_deref() == Some(prefix))
    }

    /// Look up the first registered endpoint serving a domain.
    pub fn endpoint_by_domain(&self, domain: &str) -> Option<&EndpointRegistration> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.domain == domain)
    }

    /// Resolve a prefix or domain, falling back to predefined public wikis.
    pub fn resolve(&self, name: &str) -> Option<Cow<'_, EndpointRegistration>> {
        if let Some(endpoint) = self
            .endpoint_by_prefix(name)
            .or_else(|| self.endpoint_by_domain(name))
        {
            return Some(Cow::Borrowed(endpoint));
        }
        if !self.predefined_wikis {
            return None;
        }
        wikis::predefined(name)
            .or_else(|| wikis::predefined_by_domain(name))
            .map(Cow::Owned)
    }

    /// Proxy an endpoint's API calls go through, if any.
    pub fn proxy_for<'a>(&'a self, endpoint: &'a EndpointRegistration) -> Option<&'a str> {
        match &endpoint.proxy {
            ProxySetting::Uri(uri) => Some(uri.as_str()),
            ProxySetting::Disabled => None,
            ProxySetting::Inherit => self.default_proxy_uri.as_deref(),
        }
    }

    /// Whether at least one endpoint has a URI to talk to.
    pub fn is_usable(&self) -> bool {
        self.endpoints
            .iter()
            .any(|endpoint| !endpoint.uri.is_empty())
    }

    /// Fail unless [`Self::is_usable`] holds.
    pub fn ensure_usable(&self) -> Result<(), ConfigError> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(ConfigError::Unusable)
        }
    }

    /// Socket address for the HTTP listener.
    ///
    /// `server_interface` must be an IP literal; defaults are
    /// [`DEFAULT_SERVER_INTERFACE`] and [`DEFAULT_SERVER_PORT`].
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let port = self.server_port.unwrap_or(DEFAULT_SERVER_PORT);
        let port = u16::try_from(port).map_err(|_| ConfigError::InvalidListenAddr {
            value: port.to_string(),
            message: "port out of range".to_string(),
        })?;
        let interface = self
            .server_interface
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_INTERFACE);
        let ip: IpAddr = interface
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::InvalidListenAddr {
                value: interface.to_string(),
                message: err.to_string(),
            })?;
        Ok(SocketAddr::new(ip, port))
    }
}

/// Builder for assembling a `ServiceConfiguration` in code.
#[derive(Debug, Default, Clone)]
pub struct ServiceConfigurationBuilder {
    config: ServiceConfiguration,
    endpoints: Vec<EndpointRegistration>,
}

impl ServiceConfigurationBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an endpoint; registration checks run in [`Self::build`].
    pub fn endpoint(mut self, endpoint: EndpointRegistration) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn default_proxy_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.default_proxy_uri = Some(uri.into());
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    pub fn use_preprocessor(mut self, enabled: bool) -> Self {
        self.config.use_preprocessor = enabled;
        self
    }

    pub fn use_selective_serialization(mut self, enabled: bool) -> Self {
        self.config.use_selective_serialization = enabled;
        self
    }

    pub fn cors_policy(mut self, policy: CorsPolicy) -> Self {
        self.config.cors_policy = policy;
        self
    }

    pub fn server_port(mut self, port: i64) -> Self {
        self.config.server_port = Some(port);
        self
    }

    pub fn server_interface(mut self, interface: impl Into<String>) -> Self {
        self.config.server_interface = Some(interface.into());
        self
    }

    pub fn lint_api_endpoint(mut self, uri: impl Into<String>) -> Self {
        self.config.lint_api_endpoint = Some(uri.into());
        self
    }

    pub fn require_valid_ssl(mut self, required: bool) -> Self {
        self.config.require_valid_ssl = required;
        self
    }

    pub fn predefined_wikis(mut self, enabled: bool) -> Self {
        self.config.predefined_wikis = enabled;
        self
    }

    /// Register queued endpoints in order and return the finished config.
    pub fn build(self) -> Result<ServiceConfiguration, ValidationError> {
        let mut config = self.config;
        for endpoint in self.endpoints {
            config.register(endpoint)?;
        }
        Ok(config)
    }
}

/// Remote API location the service fetches wikitext and expands templates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRegistration {
    pub uri: String,
    pub domain: String,
    #[serde(
        default,
        deserialize_with = "deserialize_prefix",
        skip_serializing_if = "Option::is_none"
    )]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "ProxySetting::is_inherit")]
    pub proxy: ProxySetting,
}

impl EndpointRegistration {
    pub fn new(uri: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            domain: domain.into(),
            prefix: None,
            proxy: ProxySetting::Inherit,
        }
    }

    /// Set the alias; an empty string clears it.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Route this endpoint through its own proxy.
    pub fn with_proxy(mut self, uri: impl Into<String>) -> Self {
        self.proxy = ProxySetting::Uri(uri.into());
        self
    }

    /// Never proxy this endpoint, even when a default proxy is set.
    pub fn without_proxy(mut self) -> Self {
        self.proxy = ProxySetting::Disabled;
        self
    }
}

/// `""` and `null` both decode to no alias.
fn deserialize_prefix<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let prefix = Option::<String>::deserialize(deserializer)?;
    Ok(prefix.filter(|prefix| !prefix.is_empty()))
}

/// Per-endpoint proxy override.
///
/// In files an absent `proxy` key inherits the default, `null` disables
/// proxying and a string names the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxySetting {
    #[default]
    Inherit,
    Disabled,
    Uri(String),
}

impl ProxySetting {
    pub fn is_inherit(&self) -> bool {
        matches!(self, ProxySetting::Inherit)
    }
}

impl Serialize for ProxySetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProxySetting::Uri(uri) => serializer.serialize_str(uri),
            ProxySetting::Inherit | ProxySetting::Disabled => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ProxySetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(uri) => ProxySetting::Uri(uri),
            None => ProxySetting::Disabled,
        })
    }
}

/// Cross-origin policy for the service's HTTP responses.
///
/// Encoded as `false` (disabled), `"*"` (any origin) or an origin string.
/// `true` is read as any origin and `""` as disabled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsPolicy {
    Disabled,
    #[default]
    AnyOrigin,
    Origin(String),
}

impl CorsPolicy {
    /// Value for the `Access-Control-Allow-Origin` header, or `None` to omit it.
    pub fn header_value(&self) -> Option<&str> {
        match self {
            CorsPolicy::Disabled => None,
            CorsPolicy::AnyOrigin => Some("*"),
            CorsPolicy::Origin(origin) => Some(origin.as_str()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, CorsPolicy::Disabled)
    }
}

impl From<bool> for CorsPolicy {
    fn from(enabled: bool) -> Self {
        if enabled {
            CorsPolicy::AnyOrigin
        } else {
            CorsPolicy::Disabled
        }
    }
}

impl From<&str> for CorsPolicy {
    fn from(origin: &str) -> Self {
        match origin {
            "" => CorsPolicy::Disabled,
            "*" => CorsPolicy::AnyOrigin,
            origin => CorsPolicy::Origin(origin.to_string()),
        }
    }
}

impl Serialize for CorsPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CorsPolicy::Disabled => serializer.serialize_bool(false),
            CorsPolicy::AnyOrigin => serializer.serialize_str("*"),
            CorsPolicy::Origin(origin) => serializer.serialize_str(origin),
        }
    }
}

impl<'de> Deserialize<'de> for CorsPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Origin(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(enabled) => CorsPolicy::from(enabled),
            Raw::Origin(origin) => CorsPolicy::from(origin.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_service_defaults() {
        let config = ServiceConfiguration::default();
        assert!(config.require_valid_ssl);
        assert!(config.use_preprocessor);
        assert!(!config.use_selective_serialization);
        assert!(!config.debug);
        assert_eq!(config.cors_policy, CorsPolicy::AnyOrigin);
        assert_eq!(config.cors_policy.header_value(), Some("*"));
        assert!(config.endpoints().is_empty());
        assert!(!config.is_usable());
    }

    #[test]
    fn register_endpoint_appends_in_order() {
        let mut config = ServiceConfiguration::default();
        config
            .register_endpoint("http://localhost/api.php", "fr.example.org", "fr_example")
            .expect("first");
        config
            .register_endpoint("http://localhost/de/api.php", "de.example.org", "de_example")
            .expect("second");

        let prefixes: Vec<_> = config
            .endpoints()
            .iter()
            .map(|endpoint| endpoint.prefix.as_deref())
            .collect();
        assert_eq!(prefixes, vec![Some("fr_example"), Some("de_example")]);
        assert_eq!(
            config.default_endpoint().map(|e| e.domain.as_str()),
            Some("fr.example.org")
        );
    }

    #[test]
    fn duplicate_prefix_keeps_first_entry() {
        let mut config = ServiceConfiguration::default();
        config
            .register_endpoint("http://a/api.php", "a.example.org", "shared")
            .expect("first");
        let err = config
            .register_endpoint("http://b/api.php", "b.example.org", "shared")
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::DuplicatePrefix {
                prefix: "shared".to_string()
            }
        );
        assert_eq!(config.endpoints().len(), 1);
        assert_eq!(config.endpoints()[0].uri, "http://a/api.php");
    }

    #[test]
    fn empty_fields_are_rejected() {
        let mut config = ServiceConfiguration::default();
        assert_eq!(
            config.register_endpoint("", "a.example.org", "a").unwrap_err(),
            ValidationError::EmptyUri
        );
        assert!(matches!(
            config.register_endpoint("http://a/api.php", "", "a"),
            Err(ValidationError::EmptyDomain { .. })
        ));
        assert!(config.endpoints().is_empty());
    }

    #[test]
    fn empty_prefix_registers_without_alias() {
        let mut config = ServiceConfiguration::default();
        config
            .register_endpoint("http://a/api.php", "a.example.org", "")
            .expect("first");
        config
            .register_endpoint("http://b/api.php", "b.example.org", "")
            .expect("second");
        assert_eq!(config.endpoints().len(), 2);
        assert!(config.endpoints().iter().all(|e| e.prefix.is_none()));
    }

    #[test]
    fn proxy_resolution_prefers_endpoint_setting() {
        let config = ServiceConfiguration::builder()
            .default_proxy_uri("http://proxy.example.org:8080")
            .endpoint(EndpointRegistration::new("http://a/api.php", "a.org").with_prefix("a"))
            .endpoint(
                EndpointRegistration::new("http://b/api.php", "b.org")
                    .with_prefix("b")
                    .with_proxy("http://other:3128"),
            )
            .endpoint(
                EndpointRegistration::new("http://c/api.php", "c.org")
                    .with_prefix("c")
                    .without_proxy(),
            )
            .build()
            .expect("config");

        let proxy = |prefix: &str| {
            let endpoint = config.endpoint_by_prefix(prefix).expect("endpoint");
            config.proxy_for(endpoint).map(str::to_string)
        };
        assert_eq!(proxy("a").as_deref(), Some("http://proxy.example.org:8080"));
        assert_eq!(proxy("b").as_deref(), Some("http://other:3128"));
        assert_eq!(proxy("c"), None);
    }

    #[test]
    fn builder_reports_first_invalid_endpoint() {
        let err = ServiceConfiguration::builder()
            .endpoint(EndpointRegistration::new("http://a/api.php", "a.org").with_prefix("x"))
            .endpoint(EndpointRegistration::new("http://b/api.php", "b.org").with_prefix("x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicatePrefix { .. }));
    }

    #[test]
    fn cors_policy_encodes_disabled_as_false() {
        let disabled = serde_json::to_value(CorsPolicy::Disabled).expect("encode");
        assert_eq!(disabled, serde_json::Value::Bool(false));

        let decoded: CorsPolicy = serde_json::from_str("false").expect("decode");
        assert_eq!(decoded, CorsPolicy::Disabled);
        assert_eq!(decoded.header_value(), None);

        let restricted: CorsPolicy = serde_json::from_str("\"some.domain.org\"").expect("decode");
        assert_eq!(restricted.header_value(), Some("some.domain.org"));

        let any: CorsPolicy = serde_json::from_str("\"*\"").expect("decode");
        assert_eq!(any, CorsPolicy::AnyOrigin);
    }

    #[test]
    fn empty_cors_origin_is_disabled() {
        let decoded: CorsPolicy = serde_json::from_str("\"\"").expect("decode");
        assert_eq!(decoded, CorsPolicy::Disabled);
        assert_eq!(decoded.header_value(), None);
        assert_eq!(CorsPolicy::from(""), CorsPolicy::Disabled);
    }

    #[test]
    fn empty_prefix_decodes_as_no_alias() {
        let endpoint: EndpointRegistration =
            serde_json::from_str(r#"{"uri":"http://a","domain":"a.org","prefix":""}"#)
                .expect("decode");
        assert_eq!(endpoint.prefix, None);

        let mut config = ServiceConfiguration::default();
        let mut registration = EndpointRegistration::new("http://a/api.php", "a.org");
        registration.prefix = Some(String::new());
        config.register(registration.clone()).expect("first");
        config.register(registration).expect("second");
        assert!(config.endpoints().iter().all(|e| e.prefix.is_none()));
    }

    #[test]
    fn proxy_null_disables_and_absent_inherits() {
        let endpoint: EndpointRegistration =
            serde_json::from_str(r#"{"uri":"http://a","domain":"a.org","proxy":null}"#)
                .expect("decode");
        assert_eq!(endpoint.proxy, ProxySetting::Disabled);

        let endpoint: EndpointRegistration =
            serde_json::from_str(r#"{"uri":"http://a","domain":"a.org"}"#).expect("decode");
        assert_eq!(endpoint.proxy, ProxySetting::Inherit);

        let encoded = serde_json::to_value(&endpoint).expect("encode");
        assert!(encoded.get("proxy").is_none());
    }

    #[test]
    fn listen_addr_fails_at_point_of_use() {
        let config = ServiceConfiguration::default();
        assert_eq!(
            config.listen_addr().expect("default").to_string(),
            "0.0.0.0:8000"
        );

        for port in [70_000, -1, 5_000_000_000] {
            let config = ServiceConfiguration::builder()
                .server_port(port)
                .build()
                .expect("config is accepted");
            assert!(matches!(
                config.listen_addr(),
                Err(ConfigError::InvalidListenAddr { .. })
            ));
        }

        let config = ServiceConfiguration::builder()
            .server_interface("127.0.0.1")
            .server_port(8142)
            .build()
            .expect("config");
        assert_eq!(
            config.listen_addr().expect("addr").to_string(),
            "127.0.0.1:8142"
        );
    }

    #[test]
    fn resolve_falls_back_to_predefined_wikis() {
        let mut config = ServiceConfiguration::default();
        config
            .register_endpoint("http://localhost/api.php", "fr.example.org", "fr_example")
            .expect("register");

        let local = config.resolve("fr_example").expect("registered");
        assert_eq!(local.uri, "http://localhost/api.php");
        let by_domain = config.resolve("fr.example.org").expect("by domain");
        assert_eq!(by_domain.prefix.as_deref(), Some("fr_example"));

        let public = config.resolve("enwiki").expect("predefined");
        assert_eq!(public.uri, "https://en.wikipedia.org/w/api.php");

        config.predefined_wikis = false;
        assert!(config.resolve("enwiki").is_none());
    }
}
