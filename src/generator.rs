//! Aggregate an ordered list of source roots into one configuration table.

use toml::Table;
use tracing::debug;

use crate::error::HelmgenError;
use crate::merge::merge_all;
use crate::source::load_source;
use crate::store::KeyValueStore;
use crate::types::{KeyLayout, RunMetadata};

/// Loads each source root from a store and deep-merges them.
///
/// Roots are given in **priority-ascending** order: the last root has the
/// highest priority. Conflicts are resolved leaf by leaf, except that a
/// scalar in a higher layer replaces a whole table from a lower one (see
/// [`merge`](crate::merge)).
///
/// ```ignore
/// let config = ConfigGenerator::new(store, vec![
///     "prod/common".into(),
///     "prod/deployment/api".into(),
///     "prod/provisioning".into(),
/// ])
/// .generate()?;
/// ```
pub struct ConfigGenerator<S> {
    store: S,
    roots: Vec<String>,
    layout: KeyLayout,
    metadata: Option<RunMetadata>,
}

impl<S: KeyValueStore> ConfigGenerator<S> {
    pub fn new(store: S, roots: Vec<String>) -> Self {
        Self {
            store,
            roots,
            layout: KeyLayout::default(),
            metadata: None,
        }
    }

    /// Override the key layout (default: `/` separator, `.` delimiter).
    pub fn layout(mut self, layout: KeyLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Metadata written over the merged result as top-level scalars.
    pub fn metadata(mut self, metadata: RunMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Load every root, merge them in order, then apply metadata.
    ///
    /// The first store failure or malformed key aborts the whole run.
    pub fn generate(&self) -> Result<Table, HelmgenError> {
        let layers = self
            .roots
            .iter()
            .map(|root| load_source(&self.store, root, &self.layout))
            .collect::<Result<Vec<_>, _>>()?;

        let mut merged = merge_all(layers);
        debug!(roots = self.roots.len(), keys = merged.len(), "merged sources");

        if let Some(metadata) = &self.metadata {
            metadata.apply(&mut merged);
        }
        Ok(merged)
    }
}
