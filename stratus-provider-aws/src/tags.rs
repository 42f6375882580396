//! Tag handling: provider-wide default tags and ignored tags

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_json::json;
use stratus_core::resource::Value;

/// Tags applied to every taggable resource unless the resource sets the key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefaultTags {
    pub tags: BTreeMap<String, String>,
}

/// Tag keys the provider never reports or manages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IgnoreTags {
    pub keys: BTreeSet<String>,
    pub key_prefixes: BTreeSet<String>,
}

impl IgnoreTags {
    pub fn ignores(&self, key: &str) -> bool {
        self.keys.contains(key) || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Resource tags merged over the defaults; resource values win
pub fn merge_default_tags(
    defaults: Option<&DefaultTags>,
    resource_tags: Option<&Value>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = defaults
        .map(|d| d.tags.clone())
        .unwrap_or_default();

    if let Some(Value::Map(tags)) = resource_tags {
        for (key, value) in tags {
            match value {
                Value::String(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                Value::Int(_) | Value::Bool(_) => {
                    merged.insert(key.clone(), value.to_string());
                }
                _ => {}
            }
        }
    }
    merged
}

/// Remove ignored keys
pub fn filter_ignored(
    tags: BTreeMap<String, String>,
    ignore: Option<&IgnoreTags>,
) -> BTreeMap<String, String> {
    match ignore {
        Some(ignore) => tags.into_iter().filter(|(k, _)| !ignore.ignores(k)).collect(),
        None => tags,
    }
}

/// Split remote tags into `(tags, tags_all)`.
///
/// `tags_all` is everything on the remote side except ignored keys. `tags`
/// additionally drops keys whose value came from the provider defaults.
pub fn split_remote_tags(
    remote: BTreeMap<String, String>,
    defaults: Option<&DefaultTags>,
    ignore: Option<&IgnoreTags>,
) -> (HashMap<String, Value>, HashMap<String, Value>) {
    let all = filter_ignored(remote, ignore);

    let own = all
        .iter()
        .filter(|(k, v)| defaults.and_then(|d| d.tags.get(*k)) != Some(*v))
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let all = all
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    (own, all)
}

/// Tags in Cloud Control format (`[{"Key": .., "Value": ..}]`)
pub fn to_tag_list(tags: &BTreeMap<String, String>) -> Vec<serde_json::Value> {
    tags.iter()
        .map(|(k, v)| json!({"Key": k, "Value": v}))
        .collect()
}

/// Parse tags from Cloud Control format
pub fn from_tag_list(tags: &[serde_json::Value]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for tag in tags {
        if let (Some(key), Some(value)) = (
            tag.get("Key").and_then(|v| v.as_str()),
            tag.get("Value").and_then(|v| v.as_str()),
        ) {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> DefaultTags {
        DefaultTags {
            tags: BTreeMap::from([
                ("Owner".to_string(), "platform".to_string()),
                ("Usage".to_string(), "default".to_string()),
            ]),
        }
    }

    #[test]
    fn resource_tags_win_over_defaults() {
        let resource_tags = Value::Map(HashMap::from([(
            "Usage".to_string(),
            Value::string("original"),
        )]));
        let merged = merge_default_tags(Some(&defaults()), Some(&resource_tags));
        assert_eq!(merged["Usage"], "original");
        assert_eq!(merged["Owner"], "platform");
    }

    #[test]
    fn ignore_by_key_and_prefix() {
        let ignore = IgnoreTags {
            keys: BTreeSet::from(["CreatedBy".to_string()]),
            key_prefixes: BTreeSet::from(["kubernetes.io/".to_string()]),
        };
        assert!(ignore.ignores("CreatedBy"));
        assert!(ignore.ignores("kubernetes.io/cluster/test"));
        assert!(!ignore.ignores("Name"));
    }

    #[test]
    fn split_drops_defaults_from_own_tags() {
        let remote = BTreeMap::from([
            ("Owner".to_string(), "platform".to_string()),
            ("Usage".to_string(), "original".to_string()),
            ("CreatedBy".to_string(), "someone".to_string()),
        ]);
        let ignore = IgnoreTags {
            keys: BTreeSet::from(["CreatedBy".to_string()]),
            ..Default::default()
        };

        let (own, all) = split_remote_tags(remote, Some(&defaults()), Some(&ignore));
        assert_eq!(own.len(), 1);
        assert_eq!(own["Usage"], Value::string("original"));
        assert_eq!(all.len(), 2);
        assert!(!all.contains_key("CreatedBy"));
    }

    #[test]
    fn tag_list_format() {
        let tags = BTreeMap::from([("Name".to_string(), "test".to_string())]);
        let list = to_tag_list(&tags);
        assert_eq!(list, vec![json!({"Key": "Name", "Value": "test"})]);
        assert_eq!(from_tag_list(&list), tags);
    }
}
