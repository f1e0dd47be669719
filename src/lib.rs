//! Aggregate layered key/value configuration into one nested tree, then
//! render Helm values templates against it.
//!
//! Configuration lives in a flat store as path-addressed entries:
//!
//! ```text
//! prod/common/db.host              = h1
//! prod/common/db.port              = 5432
//! prod/deployment/api/replicas     = 4
//! prod/provisioning/db.host        = db.internal
//! ```
//!
//! helmgen turns each layer into a nested table, deep-merges the layers, adds
//! a few run-level values, and hands the result to every template it finds:
//!
//! ```ignore
//! let config = ConfigGenerator::new(DirStore::new("/srv/bucket"), vec![
//!     "prod/common".into(),
//!     "prod/deployment/api".into(),
//!     "prod/provisioning".into(),
//! ])
//! .generate()?;
//! // {db = {host = "db.internal", port = 5432}, replicas = 4}
//! ```
//!
//! # Keys
//!
//! A key is `<root><separator><path>`, where the path joins tree segments
//! with the delimiter (`.` by default). The root is stripped, the rest split
//! into segments, and the value placed at that address. Stores that report
//! keys fully delimiter-joined (`prod.common.db.host`) work too.
//!
//! A key equal to its own root has no address; it is skipped with a warning.
//! A key outside its root, or with an empty segment (`db..host`), aborts the
//! run with [`HelmgenError::MalformedKey`].
//!
//! # Values
//!
//! Stored strings are trimmed. A value made only of decimal digits becomes
//! an integer (`" 42 "` → `42`); everything else stays a string (`"4.2"`,
//! `"042x"`, `"true"`). There is no other coercion.
//!
//! # Layer precedence
//!
//! ```text
//! E/common                 shared by every deployment
//!        ↑ overridden by
//! E/deployment/D           one deployment
//!        ↑ overridden by
//! E/provisioning           written by infrastructure provisioning
//!        ↑ overridden by
//! Run metadata             deployment, environment, image, imagetag, generatedtime
//! ```
//!
//! Tables merge key by key. Any other collision goes to the higher layer
//! **whatever its shape**: a scalar replaces a whole table and a table
//! replaces a scalar, without error. Setting `db = disabled` in a deployment
//! layer drops every `db.*` key from `common`. See [`merge`].
//!
//! # Templates
//!
//! Templates are Tera files (`*.j2` by default) found recursively under the
//! template directory. Rendering is strict: an undefined reference fails the
//! run with [`HelmgenError::UndefinedReference`], and no output is written
//! unless every template rendered. `secrets.yaml.j2` is written next to
//! itself as `secrets.generated.yaml`. The `base64encode` filter is
//! available for Kubernetes secrets.
//!
//! # Stores
//!
//! Aggregation only needs [`KeyValueStore`]: `list(prefix)` and
//! `read_bulk(keys)`. [`DirStore`] serves a local directory (one file per
//! key); [`MemoryStore`] serves a map.
//!
//! # Settings
//!
//! The tool's own settings (store location, key layout, layer names,
//! template naming) come from `helmgen.toml` files, `HELMGEN__*` environment
//! variables, and CLI flags. See [`settings`].
//!
//! # Error handling
//!
//! Every fallible operation returns [`HelmgenError`]. Nothing is retried and
//! nothing is partially written; each error names the key, root, or template
//! at fault.

pub mod error;
pub mod merge;
pub mod render;
pub mod run;
pub mod settings;
pub mod store;
pub mod types;

#[cfg(feature = "clap")]
mod cli;
mod decode;
mod discover;
mod generator;
mod source;
mod tree;

#[cfg(test)]
mod fixtures;

#[cfg(feature = "clap")]
pub use cli::Cli;
pub use decode::{coerce_value, decode_key};
pub use discover::discover_templates;
pub use error::{HelmgenError, KeyProblem};
pub use generator::ConfigGenerator;
pub use merge::{deep_merge, merge_all};
pub use render::TemplateRenderer;
pub use source::{load_source, normalize_root};
pub use store::{DirStore, KeyValueStore, MemoryStore, StoreError};
pub use tree::insert_path;
pub use types::{KeyLayout, RunMetadata, RunRequest};
