//! Schema checks and legacy key normalization for JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Legacy option names accepted in files, with their canonical keys.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("defaultAPIProxyURI", "default_proxy_uri"),
    ("usePHPPreProcessor", "use_preprocessor"),
    ("useSelser", "use_selective_serialization"),
    ("allowCORS", "cors_policy"),
    ("serverPort", "server_port"),
    ("serverInterface", "server_interface"),
    ("linterAPI", "lint_api_endpoint"),
    ("strictSSL", "require_valid_ssl"),
    ("loadWMF", "predefined_wikis"),
];

const ROOT_KEYS: &[&str] = &[
    "$schema",
    "endpoints",
    "default_proxy_uri",
    "debug",
    "use_preprocessor",
    "use_selective_serialization",
    "cors_policy",
    "server_port",
    "server_interface",
    "lint_api_endpoint",
    "require_valid_ssl",
    "predefined_wikis",
];

const ENDPOINT_KEYS: &[&str] = &["uri", "domain", "prefix", "proxy"];

/// Rename legacy keys to their canonical names in place.
///
/// Runs before validation and merging so that layers using different
/// spellings of the same option merge onto one key.
pub(super) fn normalize_aliases(value: &mut Value, layer: &str) -> Result<(), ConfigError> {
    let Value::Object(map) = value else {
        return Err(invalid_field(layer, "", "expected object"));
    };
    for (alias, canonical) in KEY_ALIASES {
        let Some(aliased) = map.remove(*alias) else {
            continue;
        };
        if map.contains_key(*canonical) {
            return Err(invalid_field(
                layer,
                alias,
                &format!("conflicts with `{canonical}`"),
            ));
        }
        map.insert((*canonical).to_string(), aliased);
    }
    Ok(())
}

/// Validate a single normalized config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(map, ROOT_KEYS, layer, "")?;

    for (key, value) in map {
        match key.as_str() {
            "$schema" => expect_string(value, layer, key)?,
            "endpoints" => validate_endpoints(value, layer, key)?,
            "debug"
            | "use_preprocessor"
            | "use_selective_serialization"
            | "require_valid_ssl"
            | "predefined_wikis" => expect_bool(value, layer, key)?,
            "default_proxy_uri" | "server_interface" | "lint_api_endpoint" => {
                expect_optional_string(value, layer, key)?
            }
            "cors_policy" => validate_cors_policy(value, layer, key)?,
            "server_port" => expect_optional_integer(value, layer, key)?,
            _ => {}
        }
    }
    Ok(())
}

/// Validate the "endpoints" list.
fn validate_endpoints(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Value::Array(entries) = value else {
        return Err(invalid_field(layer, path, "expected array"));
    };
    for (idx, entry) in entries.iter().enumerate() {
        validate_endpoint(entry, layer, &format!("{path}[{idx}]"))?;
    }
    Ok(())
}

/// Validate a single endpoint registration.
fn validate_endpoint(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, ENDPOINT_KEYS, layer, path)?;

    for required in ["uri", "domain"] {
        let field_path = join_path(path, required);
        let field = map
            .get(required)
            .ok_or_else(|| invalid_field(layer, &field_path, "missing required field"))?;
        expect_string(field, layer, &field_path)?;
    }
    if let Some(value) = map.get("prefix") {
        expect_string(value, layer, &join_path(path, "prefix"))?;
    }
    if let Some(value) = map.get("proxy") {
        expect_optional_string(value, layer, &join_path(path, "proxy"))?;
    }
    Ok(())
}

/// CORS policy is `false`/`true`, `"*"` or an origin.
fn validate_cors_policy(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value {
        Value::Bool(_) | Value::String(_) => Ok(()),
        _ => Err(invalid_field(layer, path, "expected bool or origin string")),
    }
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_optional_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() || value.is_null() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string or null"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Ports are not range-checked here; see `ServiceConfiguration::listen_addr`.
fn expect_optional_integer(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_i64() || value.is_null() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected integer"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
