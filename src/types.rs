use std::path::PathBuf;

use toml::{Table, Value};

/// How keys are addressed in the backing store.
///
/// `separator` joins the parts of a source root (`prod/deployment/api`);
/// `delimiter` joins the tree path below it (`db.host`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    pub separator: String,
    pub delimiter: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            separator: "/".into(),
            delimiter: ".".into(),
        }
    }
}

/// One invocation of the tool, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub environment: String,
    pub deployment: String,
    pub image: String,
    pub image_tag: String,
    pub debug: bool,
    /// Extra settings file, merged above the discovered ones.
    pub settings_file: Option<PathBuf>,
    /// Dotted-key settings overrides (highest priority).
    pub overrides: Vec<(String, Value)>,
}

/// Top-level scalars written over the merged configuration before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub deployment: String,
    pub environment: String,
    pub image: String,
    pub image_tag: String,
    pub generated_time: String,
}

impl RunMetadata {
    /// Build metadata for `request`, stamped with the current UTC time.
    pub fn for_request(request: &RunRequest) -> Self {
        Self {
            deployment: request.deployment.clone(),
            environment: request.environment.clone(),
            image: request.image.clone(),
            image_tag: request.image_tag.clone(),
            generated_time: chrono::Utc::now()
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string(),
        }
    }

    /// Overwrite the metadata keys on `context`. Applied last, so these win
    /// over any same-named top-level key a source defined.
    pub fn apply(&self, context: &mut Table) {
        let entries = [
            ("deployment", &self.deployment),
            ("environment", &self.environment),
            ("image", &self.image),
            ("imagetag", &self.image_tag),
            ("generatedtime", &self.generated_time),
        ];
        for (key, value) in entries {
            context.insert(key.to_string(), Value::String(value.clone()));
        }
    }
}
