//! Load one source root from the store into a nested table.

use toml::Table;
use tracing::{debug, info, warn};

use crate::decode::{coerce_value, decode_key};
use crate::error::{HelmgenError, KeyProblem};
use crate::store::{KeyValueStore, StoreError};
use crate::tree::insert_path;
use crate::types::KeyLayout;

/// Ensure `root` ends with the store separator, so `prod/common` cannot match
/// keys under `prod/commonality`. An empty root stays empty (whole store).
pub fn normalize_root(root: &str, separator: &str) -> String {
    if root.is_empty() || root.ends_with(separator) {
        root.to_string()
    } else {
        format!("{root}{separator}")
    }
}

/// Fetch every key under `root` and build this layer's table.
///
/// Keys may come back separator-joined (`prod/common/db.host`) or fully
/// delimiter-joined (`prod.common.db.host`); both forms of the root are
/// stripped. A key equal to the root itself carries no path and is skipped
/// with a warning. Any other malformed key aborts the load.
pub fn load_source<S: KeyValueStore>(
    store: &S,
    root: &str,
    layout: &KeyLayout,
) -> Result<Table, HelmgenError> {
    let prefix = normalize_root(root, &layout.separator);
    let joined_prefix = prefix.replace(layout.separator.as_str(), &layout.delimiter);
    let unavailable = |source: StoreError| HelmgenError::SourceUnavailable {
        root: root.to_string(),
        source,
    };

    let keys = store.list(&prefix).map_err(unavailable)?;
    let values = store.read_bulk(&keys).map_err(unavailable)?;

    let mut table = Table::new();
    for (key, raw) in &values {
        let key_prefix = if key.starts_with(prefix.as_str()) {
            &prefix
        } else {
            &joined_prefix
        };
        let segments = match decode_key(key, key_prefix, &layout.delimiter) {
            Ok(segments) => segments,
            Err(HelmgenError::MalformedKey {
                problem: KeyProblem::EmptyPath,
                ..
            }) => {
                warn!(key = %key, root, "skipping key with no path below its root");
                continue;
            }
            Err(e) => return Err(e),
        };
        debug!(key = %key, path = ?segments, "decoded key");
        insert_path(&mut table, &segments, coerce_value(raw));
    }

    info!(root, keys = values.len(), "loaded source");
    Ok(table)
}
