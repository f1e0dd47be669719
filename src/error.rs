use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Why a store key could not be turned into a tree address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProblem {
    /// The key does not begin with the source root.
    MissingPrefix,
    /// Nothing is left once the root is stripped.
    EmptyPath,
    /// Two delimiters in a row, or a leading/trailing delimiter.
    EmptySegment,
}

impl fmt::Display for KeyProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyProblem::MissingPrefix => write!(f, "key does not start with the source root"),
            KeyProblem::EmptyPath => write!(f, "key has no path below the source root"),
            KeyProblem::EmptySegment => write!(f, "key contains an empty path segment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HelmgenError {
    #[error("Source '{root}' is unavailable: {source}")]
    SourceUnavailable { root: String, source: StoreError },

    #[error("Malformed key '{key}' under '{prefix}': {problem}")]
    MalformedKey {
        key: String,
        prefix: String,
        problem: KeyProblem,
    },

    #[error("Undefined reference in template {template}: {detail}")]
    UndefinedReference { template: PathBuf, detail: String },

    #[error("Failed to render template {template}: {detail}")]
    Render { template: PathBuf, detail: String },

    #[error("Templates {first} and {second} would both write {output}")]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Could not find .{extension} files under {dir}. Nothing to do.")]
    NoTemplatesFound { dir: PathBuf, extension: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] confique::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("No store location configured; pass --bucket or set store.root")]
    StoreRequired,
}
