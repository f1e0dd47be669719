//! Deep merge of configuration layers.
//!
//! Only table/table collisions recurse. Any other collision at the same path
//! (scalar over scalar, scalar over table, table over scalar) is settled by
//! taking the overlay's value as-is; no type-mismatch error is ever raised.
//! A layer that sets `db = "disabled"` therefore wipes out every `db.*` key
//! from the layers below it.

use toml::Table;

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a Table for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(toml::Value::Table(base_tbl)), toml::Value::Table(overlay_tbl)) => {
                base.insert(key, toml::Value::Table(deep_merge(base_tbl, overlay_tbl)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Merge layers in precedence order: the first is lowest, the last highest.
pub fn merge_all(layers: impl IntoIterator<Item = Table>) -> Table {
    layers.into_iter().fold(Table::new(), deep_merge)
}
