//! End-to-end pipeline: settings → store → merged context → rendered files.
//!
//! Steps, each of which aborts the run on failure:
//!
//! 1. Open the store named by `store.root`
//! 2. Aggregate the deployment's source roots and apply run metadata
//! 3. Discover templates under `templates.dir`
//! 4. Render every template
//! 5. Write the outputs
//!
//! Nothing is written until every template has rendered and no two templates
//! claim the same output, so one bad template leaves no partial output behind.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Table;
use tracing::info;

use crate::discover::discover_templates;
use crate::error::HelmgenError;
use crate::generator::ConfigGenerator;
use crate::render::TemplateRenderer;
use crate::settings::Settings;
use crate::store::{DirStore, KeyValueStore};
use crate::types::{RunMetadata, RunRequest};

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// `(template, output)` pairs, in render order.
    pub written: Vec<(PathBuf, PathBuf)>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rendered {} template(s):", self.written.len())?;
        for (template, output) in &self.written {
            write!(f, "\n  {} -> {}", template.display(), output.display())?;
        }
        Ok(())
    }
}

/// The directory store configured in `settings`.
pub fn open_store(settings: &Settings) -> Result<DirStore, HelmgenError> {
    let root = settings
        .store
        .root
        .clone()
        .ok_or(HelmgenError::StoreRequired)?;
    Ok(DirStore::new(root))
}

/// Aggregate the layers for `request` and stamp the run metadata on top.
pub fn build_context<S: KeyValueStore>(
    request: &RunRequest,
    settings: &Settings,
    store: S,
) -> Result<Table, HelmgenError> {
    let roots = settings.source_roots(&request.environment, &request.deployment);
    ConfigGenerator::new(store, roots)
        .layout(settings.layout())
        .metadata(RunMetadata::for_request(request))
        .generate()
}

/// Pretty JSON view of a context or settings, for `--debug`.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HelmgenError> {
    serde_json::to_string_pretty(value).map_err(|e| HelmgenError::InvalidValue {
        key: "<debug>".into(),
        reason: e.to_string(),
    })
}

/// Render every discovered template against `context`, then write them all.
pub fn render_all(settings: &Settings, context: &Table) -> Result<RunReport, HelmgenError> {
    let templates = &settings.templates;
    let found = discover_templates(Path::new(&templates.dir), &templates.extension)?;
    info!(count = found.len(), "found templates");
    for path in &found {
        info!(template = %path.display(), "found template");
    }

    let mut renderer = TemplateRenderer::new(&templates.extension, &templates.generated_suffix);
    let rendered = found
        .iter()
        .map(|path| renderer.render_file(path, context))
        .collect::<Result<Vec<_>, _>>()?;

    let mut claimed: HashMap<&Path, &Path> = HashMap::new();
    for item in &rendered {
        if let Some(first) = claimed.insert(&item.output, &item.template) {
            return Err(HelmgenError::DuplicateOutput {
                output: item.output.clone(),
                first: first.to_path_buf(),
                second: item.template.clone(),
            });
        }
    }

    let mut written = Vec::with_capacity(rendered.len());
    for item in rendered {
        item.write()?;
        written.push((item.template, item.output));
    }
    Ok(RunReport { written })
}

/// Build the context from `store` and render all templates.
pub fn run<S: KeyValueStore>(
    request: &RunRequest,
    settings: &Settings,
    store: S,
) -> Result<RunReport, HelmgenError> {
    let context = build_context(request, settings, store)?;
    render_all(settings, &context)
}
