//! Build nested tables from decoded key paths.

use toml::{Table, Value};

/// Set `value` at `segments` inside `table`, creating intermediate tables.
///
/// `(["db", "host"], "h1")` becomes `{db = {host = "h1"}}`. Whatever already
/// sits at the exact path is replaced, and a scalar in the way of an
/// intermediate segment is replaced by a fresh table: within one source the
/// last write wins.
pub fn insert_path(table: &mut Table, segments: &[String], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut current = table;
    for segment in parents {
        let slot = current
            .entry(segment.as_str())
            .or_insert_with(|| Value::Table(Table::new()));
        if !slot.is_table() {
            *slot = Value::Table(Table::new());
        }
        let Value::Table(next) = slot else {
            return;
        };
        current = next;
    }

    current.insert(leaf.clone(), value);
}

/// Look up the value at `segments`. Numeric segments index into arrays.
pub(crate) fn get_path<'a>(table: &'a Table, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = table.get(*first)?;
    for segment in rest {
        current = match current {
            Value::Table(t) => t.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
