//! Flattened attribute view used by checks
//!
//! Nested values are addressed by dotted keys: `route.#` holds the number of
//! elements, `route.0.description` a field of the first one and `tags.%` the
//! number of map entries. Blocks are list elements and have no `%` key.
//! Elements keep the order they were read in, so set indices are positional.

use std::collections::{BTreeMap, HashMap};

use stratus_core::resource::Value;

pub fn flatten(attributes: &HashMap<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in attributes {
        flatten_value(key, value, false, &mut out);
    }
    out
}

fn flatten_value(prefix: &str, value: &Value, in_list: bool, out: &mut BTreeMap<String, String>) {
    match value {
        Value::List(items) => {
            out.insert(format!("{prefix}.#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_value(&format!("{prefix}.{i}"), item, true, out);
            }
        }
        Value::Map(map) => {
            if !in_list {
                out.insert(format!("{prefix}.%"), map.len().to_string());
            }
            for (key, item) in map {
                flatten_value(&format!("{prefix}.{key}"), item, false, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// True for `x.#` and `x.%` keys
pub fn is_count_key(key: &str) -> bool {
    key.ends_with(".#") || key.ends_with(".%")
}
