//! Reading layer files and the default layer locations.

use super::{Candidate, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Read one layer as a normalized, schema-checked value.
///
/// Returns `None` when an optional layer file does not exist.
pub(super) fn read_layer(candidate: &Candidate) -> Result<Option<Value>, ConfigError> {
    let path = &candidate.path;
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound && !candidate.required => {
            debug!(
                "no layer file (source={:?}, path={})",
                candidate.source,
                path.display()
            );
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    debug!(
        "read layer (source={:?}, path={})",
        candidate.source,
        path.display()
    );

    let label = format!("{}({})", source_name(candidate.source), path.display());
    let mut value: Value = json5::from_str(&contents)?;
    schema::normalize_aliases(&mut value, &label)?;
    schema::validate_layer_schema(&value, &label)?;
    Ok(Some(value))
}

fn source_name(source: ConfigLayerSource) -> &'static str {
    match source {
        ConfigLayerSource::Requirements => "requirements",
        ConfigLayerSource::System => "system",
        ConfigLayerSource::User => "user",
        ConfigLayerSource::Project => "project",
        ConfigLayerSource::Cwd => "cwd",
        ConfigLayerSource::Repo => "repo",
        ConfigLayerSource::Runtime => "runtime",
    }
}

#[cfg(unix)]
pub(super) fn default_system_config_path() -> Option<PathBuf> {
    Some(PathBuf::from("/etc/wikirender").join(DEFAULT_CONFIG_FILE))
}

#[cfg(not(unix))]
pub(super) fn default_system_config_path() -> Option<PathBuf> {
    None
}

#[cfg(unix)]
pub(super) fn default_requirements_path() -> Option<PathBuf> {
    Some(PathBuf::from("/etc/wikirender/requirements.json5"))
}

#[cfg(not(unix))]
pub(super) fn default_requirements_path() -> Option<PathBuf> {
    None
}

/// `~/.wikirender/wikirender.json5`.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}
