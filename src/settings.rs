//! The tool's own settings: where the store lives, how its keys are laid out,
//! which layers make up a deployment, and how templates are named.
//!
//! Settings are layered the same way the aggregated configuration is, lowest
//! priority first:
//!
//! ```text
//! Compiled defaults     #[config(default = ...)]
//!        ↑ overridden by
//! Settings files        platform config dir, then cwd, then --settings
//!        ↑ overridden by
//! Environment vars      HELMGEN__SECTION__KEY
//!        ↑ overridden by
//! Overrides             CLI flags such as --bucket
//! ```
//!
//! Every layer is sparse and merged with [`merge_all`], so a settings
//! file only needs the keys it changes.
//!
//! ```toml
//! [store]
//! root = "/srv/config-bucket"
//!
//! [layers]
//! provisioning = "infra"
//! ```

use std::path::{Path, PathBuf};

use confique::Config;
use serde::Serialize;
use toml::{Table, Value};
use tracing::debug;

use crate::decode::{coerce_value, decode_key};
use crate::error::HelmgenError;
use crate::merge::merge_all;
use crate::tree::insert_path;
use crate::types::KeyLayout;

pub const SETTINGS_FILE: &str = "helmgen.toml";
pub const ENV_PREFIX: &str = "HELMGEN";
const ENV_DELIMITER: &str = "__";

#[derive(Config, Serialize, Debug)]
pub struct Settings {
    /// Key/value store location and addressing.
    #[config(nested)]
    pub store: StoreSettings,

    /// Names of the configuration layers under an environment.
    #[config(nested)]
    pub layers: LayerSettings,

    /// Template discovery and output naming.
    #[config(nested)]
    pub templates: TemplateSettings,
}

#[derive(Config, Serialize, Debug)]
pub struct StoreSettings {
    /// Directory holding the store (one file per key).
    pub root: Option<PathBuf>,

    /// Joins the parts of a source root.
    #[config(default = "/")]
    pub separator: String,

    /// Joins the tree path below a source root.
    #[config(default = ".")]
    pub delimiter: String,
}

#[derive(Config, Serialize, Debug)]
pub struct LayerSettings {
    /// Shared by every deployment of an environment.
    #[config(default = "common")]
    pub common: String,

    /// Parent of the per-deployment layers.
    #[config(default = "deployment")]
    pub deployment: String,

    /// Written by provisioning; highest priority.
    #[config(default = "provisioning")]
    pub provisioning: String,
}

#[derive(Config, Serialize, Debug)]
pub struct TemplateSettings {
    /// Directory searched recursively for templates.
    #[config(default = ".")]
    pub dir: String,

    /// Template file extension, without the dot.
    #[config(default = "j2")]
    pub extension: String,

    /// Marker inserted into generated YAML file names.
    #[config(default = "generated")]
    pub generated_suffix: String,
}

impl Settings {
    pub fn layout(&self) -> KeyLayout {
        KeyLayout {
            separator: self.store.separator.clone(),
            delimiter: self.store.delimiter.clone(),
        }
    }

    /// Source roots for one deployment, lowest priority first:
    /// `E/common`, `E/deployment/D`, `E/provisioning`.
    pub fn source_roots(&self, environment: &str, deployment: &str) -> Vec<String> {
        let sep = &self.store.separator;
        vec![
            format!("{environment}{sep}{}", self.layers.common),
            format!(
                "{environment}{sep}{}{sep}{deployment}",
                self.layers.deployment
            ),
            format!("{environment}{sep}{}", self.layers.provisioning),
        ]
    }
}

/// All pre-loaded data needed to resolve settings. No I/O happens here.
pub struct SettingsInput {
    /// File contents in precedence order: first = lowest priority, last = highest.
    pub files: Vec<(PathBuf, String)>,
    /// Raw environment variable pairs.
    pub env_vars: Vec<(String, String)>,
    /// Env var prefix. `None` disables env lookup.
    pub env_prefix: Option<String>,
    /// Dotted-key overrides (highest priority).
    pub overrides: Vec<(String, Value)>,
}

/// Resolve helmgen's settings from pre-loaded input.
///
/// Layers are collected as tables in ascending priority (each file, then the
/// `HELMGEN__*` variables, then CLI overrides) and folded with
/// [`merge_all`], the same merge the aggregated configuration uses. Keys no
/// layer sets, such as `templates.extension`, get their compiled default
/// from confique.
pub fn resolve(input: SettingsInput) -> Result<Settings, HelmgenError> {
    let mut layers = input
        .files
        .iter()
        .map(|(path, content)| parse_settings_file(path, content))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(prefix) = &input.env_prefix {
        layers.push(env_to_table(prefix, input.env_vars));
    }
    layers.push(overrides_to_table(&input.overrides));

    let merged = merge_all(layers);
    debug!(sections = merged.len(), "merged settings layers");

    // A wrongly typed value (`store.separator = 1`) fails here, before
    // confique sees the layer.
    let layer: <Settings as Config>::Layer = Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| HelmgenError::InvalidValue {
            key: "<settings>".into(),
            reason: e.to_string(),
        })?;

    Settings::builder()
        .preloaded(layer)
        .load()
        .map_err(HelmgenError::from)
}

fn parse_settings_file(path: &Path, content: &str) -> Result<Table, HelmgenError> {
    toml::from_str(content).map_err(|e| HelmgenError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Build a table from environment variables matching `{PREFIX}__*`.
///
/// `__` separates nesting levels and segments are lowercased, so
/// `HELMGEN__STORE__ROOT` sets `store.root`. Values go through the same digit
/// coercion as store values. Variables that do not decode are ignored.
pub fn env_to_table(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Table {
    let needle = format!("{prefix}{ENV_DELIMITER}");
    let mut table = Table::new();

    for (key, value) in vars {
        if !key.starts_with(&needle) {
            continue;
        }
        match decode_key(&key, &needle, ENV_DELIMITER) {
            Ok(segments) => {
                let segments: Vec<String> = segments.iter().map(|s| s.to_lowercase()).collect();
                insert_path(&mut table, &segments, coerce_value(&value));
            }
            Err(e) => debug!(var = %key, error = %e, "ignoring environment variable"),
        }
    }

    table
}

/// Convert dotted-key overrides into a nested table. Later entries win.
pub fn overrides_to_table(entries: &[(String, Value)]) -> Table {
    let mut table = Table::new();
    for (dotted_key, value) in entries {
        let segments: Vec<String> = dotted_key.split('.').map(str::to_string).collect();
        insert_path(&mut table, &segments, value.clone());
    }
    table
}

/// Read settings files in priority order: the platform config directory,
/// then the working directory, then `explicit`.
///
/// Missing discovered files are skipped. A missing `explicit` file is an
/// error, since the user asked for it by name.
pub fn load_settings_files(
    explicit: Option<&Path>,
) -> Result<Vec<(PathBuf, String)>, HelmgenError> {
    let mut dirs = Vec::new();
    if let Some(proj) = directories::ProjectDirs::from("", "", "helmgen") {
        dirs.push(proj.config_dir().to_path_buf());
    }
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    let mut files = read_existing(dirs.iter().map(|d| d.join(SETTINGS_FILE)))?;
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| HelmgenError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        files.push((path.to_path_buf(), content));
    }
    Ok(files)
}

fn read_existing(
    paths: impl IntoIterator<Item = PathBuf>,
) -> Result<Vec<(PathBuf, String)>, HelmgenError> {
    let mut results = Vec::new();
    for file_path in paths {
        match std::fs::read_to_string(&file_path) {
            Ok(content) => {
                debug!(path = %file_path.display(), "loaded settings file");
                results.push((file_path, content));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(HelmgenError::IoError {
                    path: file_path,
                    source: e,
                });
            }
        }
    }
    Ok(results)
}

/// Load settings from files, the process environment, and `overrides`.
pub fn load(
    explicit: Option<&Path>,
    overrides: Vec<(String, Value)>,
) -> Result<Settings, HelmgenError> {
    let input = SettingsInput {
        files: load_settings_files(explicit)?,
        env_vars: std::env::vars().collect(),
        env_prefix: Some(ENV_PREFIX.to_string()),
        overrides,
    };
    resolve(input)
}
