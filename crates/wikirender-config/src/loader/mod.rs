//! Layered configuration loader with requirement constraints.
//!
//! Every layer is a JSON5 document using either canonical or legacy option
//! names. Layers are normalized and checked on their own, merged in
//! precedence order on top of the requirements layer (whose keys are
//! locked), and the merged document is decoded into a `ServiceConfiguration`.

mod layer_io;
mod merge;
mod paths;
mod schema;


use crate::{ConfigError, ServiceConfiguration};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Config filename looked up in the project root, cwd and config dirs.
const DEFAULT_CONFIG_FILE: &str = "wikirender.json5";
/// Per-user and per-repo config directory.
const DEFAULT_CONFIG_DIR: &str = ".wikirender";
/// Entries marking a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

/// Effective config plus the layers it was merged from.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: ServiceConfiguration,
    /// Layers that contributed, requirements first.
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer sits in the stack, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Locked keys that later layers cannot override.
    Requirements,
    System,
    User,
    /// `wikirender.json5` in the project root.
    Project,
    /// `wikirender.json5` in the working directory.
    Cwd,
    /// `.wikirender/wikirender.json5` in the project root.
    Repo,
    /// Explicit override files, applied last.
    Runtime,
}

/// A layer that was read and merged.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find the project root and cwd layer.
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    pub requirements_path: Option<PathBuf>,
    /// Override files; unlike discovered layers these must exist.
    pub runtime_paths: Vec<PathBuf>,
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Default locations: `/etc/wikirender/` on Unix and `~/.wikirender/`.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            requirements_path: layer_io::default_requirements_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Layer files to consider after the requirements, in precedence order.
    fn candidates(&self, cwd: &Path) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = [
            (ConfigLayerSource::System, &self.system_config_path),
            (ConfigLayerSource::User, &self.user_config_path),
        ]
        .into_iter()
        .filter_map(|(source, path)| Some(Candidate::optional(source, path.clone()?)))
        .collect();

        let project_root = paths::find_project_root(cwd, &self.project_root_markers);
        if let Some(root) = &project_root {
            debug!("resolved project root: {}", root.display());
            candidates.push(Candidate::optional(
                ConfigLayerSource::Project,
                root.join(DEFAULT_CONFIG_FILE),
            ));
        }
        candidates.push(Candidate::optional(
            ConfigLayerSource::Cwd,
            cwd.join(DEFAULT_CONFIG_FILE),
        ));
        if let Some(root) = &project_root {
            candidates.push(Candidate::optional(
                ConfigLayerSource::Repo,
                root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
            ));
        }

        candidates.extend(self.runtime_paths.iter().map(|path| Candidate {
            source: ConfigLayerSource::Runtime,
            path: path.clone(),
            required: true,
        }));
        candidates
    }
}

/// A possible layer file.
#[derive(Debug)]
struct Candidate {
    source: ConfigLayerSource,
    path: PathBuf,
    required: bool,
}

impl Candidate {
    fn optional(source: ConfigLayerSource, path: PathBuf) -> Self {
        Self {
            source,
            path,
            required: false,
        }
    }
}

/// Merge state while walking the layer stack.
struct LayerStack {
    merged: Value,
    locked: Option<Value>,
    layers: Vec<ConfigLayer>,
    seen: HashSet<PathBuf>,
}

impl LayerStack {
    fn new() -> Self {
        Self {
            merged: Value::Object(Map::new()),
            locked: None,
            layers: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Read `candidate` and merge it; missing optional and repeated files are skipped.
    fn push(&mut self, candidate: &Candidate) -> Result<(), ConfigError> {
        if !self.seen.insert(paths::dedup_key(&candidate.path)) {
            debug!(
                "skipping file already merged (source={:?}, path={})",
                candidate.source,
                candidate.path.display()
            );
            return Ok(());
        }
        let Some(value) = layer_io::read_layer(candidate)? else {
            return Ok(());
        };
        if candidate.source == ConfigLayerSource::Requirements {
            merge::merge_layer(&mut self.merged, &value, None);
            self.locked = Some(value);
        } else {
            merge::merge_layer(&mut self.merged, &value, self.locked.as_ref());
        }
        self.layers.push(ConfigLayer {
            source: candidate.source,
            path: Some(candidate.path.clone()),
        });
        Ok(())
    }
}

impl ServiceConfiguration {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let contents = fs::read_to_string(path)?;
        config_from_contents(&contents, &format!("config({})", path.display()))
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        config_from_contents(contents, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): requirements (constraints), system, user,
    /// project, cwd, repo, runtime overrides.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = paths::canonical_cwd(&options.cwd)?;
        let mut stack = LayerStack::new();

        if let Some(path) = &options.requirements_path {
            stack.push(&Candidate::optional(
                ConfigLayerSource::Requirements,
                path.clone(),
            ))?;
        }
        for candidate in options.candidates(&cwd) {
            stack.push(&candidate)?;
        }

        let config = config_from_value(stack.merged, "effective")?;
        info!(
            "layered config loaded (layers={}, endpoints={})",
            stack.layers.len(),
            config.endpoints().len()
        );
        Ok(LayeredConfig {
            config,
            layers: stack.layers,
        })
    }
}

/// Parse, normalize and decode a standalone config document.
fn config_from_contents(contents: &str, label: &str) -> Result<ServiceConfiguration, ConfigError> {
    let mut value: Value = json5::from_str(contents)?;
    schema::normalize_aliases(&mut value, label)?;
    config_from_value(value, label)
}

/// Decode a normalized value and re-check endpoint registrations.
fn config_from_value(value: Value, label: &str) -> Result<ServiceConfiguration, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: ServiceConfiguration = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
