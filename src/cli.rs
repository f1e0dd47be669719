//! Clap adapter for helmgen.
//!
//! Compiled only with the `clap` Cargo feature (on by default). The only
//! bridge to the core is [`Cli::into_request()`], which converts parsed
//! arguments into a [`RunRequest`](crate::RunRequest). Everything after that
//! is framework-agnostic, so embedding helmgen behind another parser means
//! building a `RunRequest` directly.

use std::path::PathBuf;

use clap::Parser;
use toml::Value;

use crate::types::RunRequest;

/// Render Helm values templates from layered key/value configuration.
#[derive(Debug, Parser)]
#[command(name = "helmgen", version)]
pub struct Cli {
    /// Key/value store location (a directory with one file per key).
    #[arg(long)]
    pub bucket: PathBuf,

    /// Deployment name; selects the deployment layer.
    #[arg(long)]
    pub deployment: String,

    /// Project environment; the top-level prefix of every layer.
    #[arg(long)]
    pub environment: String,

    /// Image name, exposed to templates as `image`.
    #[arg(long)]
    pub image: String,

    /// Image tag, exposed to templates as `imagetag`.
    #[arg(long)]
    pub imagetag: String,

    /// Print the merged context and log at debug level.
    #[arg(long)]
    pub debug: bool,

    /// Extra settings file, read after the discovered ones.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Directory to search for templates (overrides `templates.dir`).
    #[arg(long)]
    pub templates: Option<PathBuf>,
}

impl Cli {
    /// Convert clap-parsed args into a framework-agnostic `RunRequest`.
    ///
    /// `--bucket` and `--templates` become settings overrides, so they win
    /// over settings files and `HELMGEN__*` variables.
    pub fn into_request(self) -> RunRequest {
        let mut overrides = vec![(
            "store.root".to_string(),
            Value::String(self.bucket.to_string_lossy().into_owned()),
        )];
        if let Some(dir) = self.templates {
            overrides.push((
                "templates.dir".to_string(),
                Value::String(dir.to_string_lossy().into_owned()),
            ));
        }

        RunRequest {
            environment: self.environment,
            deployment: self.deployment,
            image: self.image,
            image_tag: self.imagetag,
            debug: self.debug,
            settings_file: self.settings,
            overrides,
        }
    }
}
