//! Tag normalization across catalog API versions.
//!
//! Older catalog API versions return tags as a plain string array; newer
//! versions return a map of tag name to a truthy marker. Both shapes are
//! accepted at the ingestion boundary and canonicalized to a sorted,
//! deduplicated list before storage.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;

/// Canonical tag collection for a skill.
///
/// Internally a sorted, deduplicated list. Serializes as a JSON string
/// array regardless of which shape it was parsed from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Build a tag set from arbitrary tag names, normalizing each entry.
    pub fn from_iter<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = tags
            .into_iter()
            .filter_map(|t| normalize_tag(t.as_ref()))
            .collect();
        Self(set.into_iter().collect())
    }

    /// Get the canonical tag list.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, tag: &str) -> bool {
        let normalized = normalize_tag(tag);
        match normalized {
            Some(t) => self.0.binary_search(&t).is_ok(),
            None => false,
        }
    }

    /// Encode as a JSON array string for storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decode from the stored JSON array string.
    pub fn from_json(raw: &str) -> Self {
        let tags: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
        Self::from_iter(tags)
    }
}

/// Normalize a single tag: trim, lowercase, drop empties.
fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

impl Serialize for TagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            // Current shape: ["web", "search"]
            Value::Array(items) => {
                let tags = items.into_iter().filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                });
                Ok(TagSet::from_iter(tags))
            }
            // Legacy shape: {"web": true, "search": 1}
            Value::Object(map) => {
                let tags = map
                    .into_iter()
                    .filter(|(_, v)| is_truthy(v))
                    .map(|(k, _)| k);
                Ok(TagSet::from_iter(tags))
            }
            Value::Null => Ok(TagSet::default()),
            other => Err(de::Error::custom(format!(
                "tags must be an array or map, got {other}"
            ))),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_shape() {
        let tags: TagSet = serde_json::from_str(r#"["Web", "search", "web", "  "]"#).unwrap();
        assert_eq!(tags.as_slice(), &["search", "web"]);
    }

    #[test]
    fn test_map_shape() {
        let tags: TagSet =
            serde_json::from_str(r#"{"web": true, "search": 1, "stale": false, "old": 0}"#)
                .unwrap();
        assert_eq!(tags.as_slice(), &["search", "web"]);
    }

    #[test]
    fn test_null_is_empty() {
        let tags: TagSet = serde_json::from_str("null").unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_scalar_rejected() {
        let result: Result<TagSet, _> = serde_json::from_str(r#""web""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_as_array() {
        let tags = TagSet::from_iter(["b", "a"]);
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_storage_roundtrip() {
        let tags = TagSet::from_iter(["rust", "http"]);
        let stored = tags.to_json();
        assert_eq!(TagSet::from_json(&stored), tags);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let tags = TagSet::from_iter(["Web"]);
        assert!(tags.contains("web"));
        assert!(tags.contains("WEB"));
        assert!(!tags.contains("search"));
    }
}
