//! Chart value handling: deep merge and `key.path=value` overrides.

use serde_json::{Map, Value};

/// Merge `overrides` into `base`
///
/// Nested objects merge key by key. Anything else in `overrides` (scalars,
/// arrays, null) replaces the value in `base` wholesale.
#[must_use]
pub fn merge_values(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                let next = match merged.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overrides) => overrides.clone(),
    }
}

/// Parse `a.b.c=value` overrides into a nested object
///
/// Values are kept as strings. Later entries win on conflicts; an entry whose
/// path runs through an existing string leaf replaces that leaf.
///
/// # Errors
///
/// Returns the offending entry when it has no `=` or an empty key segment.
pub fn parse_overrides<'a, I>(entries: I) -> Result<Value, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut root = Map::new();
    for entry in entries {
        let (path, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("override `{entry}` is not of the form key=value"))?;
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("override `{entry}` has an empty key segment"));
        }
        insert_path(&mut root, &segments, value);
    }
    Ok(Value::Object(root))
}

fn insert_path(map: &mut Map<String, Value>, segments: &[&str], value: &str) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = map;
    for segment in parents {
        let slot = cursor
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        cursor = next;
    }
    cursor.insert((*last).to_string(), Value::String(value.to_string()));
}
