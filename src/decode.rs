//! Turn a flat store key into a tree address, and a raw stored string into a
//! typed leaf.

use toml::Value;

use crate::error::{HelmgenError, KeyProblem};

/// Strip `prefix` from `key` and split the remainder on `delimiter`.
///
/// The last segment is the leaf name, the ones before it are the nesting
/// path: `decode_key("prod.common.db.host", "prod.common.", ".")` gives
/// `["db", "host"]`. The result is never empty.
pub fn decode_key(key: &str, prefix: &str, delimiter: &str) -> Result<Vec<String>, HelmgenError> {
    let malformed = |problem| HelmgenError::MalformedKey {
        key: key.to_string(),
        prefix: prefix.to_string(),
        problem,
    };

    let rest = key
        .strip_prefix(prefix)
        .ok_or_else(|| malformed(KeyProblem::MissingPrefix))?;
    if rest.is_empty() {
        return Err(malformed(KeyProblem::EmptyPath));
    }

    let segments: Vec<String> = rest.split(delimiter).map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return Err(malformed(KeyProblem::EmptySegment));
    }
    Ok(segments)
}

/// Coerce a raw stored value into a leaf.
///
/// Surrounding whitespace is trimmed. A value made only of ASCII digits
/// becomes an integer; anything else (signs, decimals, booleans, digit strings
/// too large for `i64`) stays a string.
pub fn coerce_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if !trimmed.is_empty()
        && trimmed.bytes().all(|b| b.is_ascii_digit())
        && let Ok(i) = trimmed.parse::<i64>()
    {
        return Value::Integer(i);
    }
    Value::String(trimmed.to_string())
}
