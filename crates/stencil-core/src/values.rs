//! The value store: a configuration tree with deep merge and dotted-path access

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container with deep merge capability
///
/// Keys are unique by construction (a JSON object cannot hold a key twice) and
/// maps serialize in sorted key order, so two stores built from the same
/// inputs always render identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    ///
    /// An empty document yields empty values rather than `null`.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(match value {
            JsonValue::Null => Self::new(),
            other => Self(other),
        })
    }

    /// Parse values from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Ok(Self(value))
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Merge multiple values in order, later entries winning
    pub fn merge_all(values: Vec<Values>) -> Self {
        let mut result = Values::new();
        for v in values {
            result.merge(&v);
        }
        result
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidOverride {
                message: format!("'{}' is not a valid dotted path", path),
            });
        }
        set_nested(&mut self.0, &parts, value);
        Ok(())
    }

    /// Get a value by dotted path
    ///
    /// Numeric segments index into arrays: `containers.0.image`.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        if path.is_empty() {
            return Some(&self.0);
        }
        let parts: Vec<&str> = path.split('.').collect();
        lookup(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Merge with schema defaults applied first
    ///
    /// Schema defaults have the lowest priority, so they only fill keys the
    /// base values leave unset.
    pub fn with_schema_defaults(schema_defaults: Values, base: Values) -> Self {
        let mut result = if schema_defaults.0.is_object() {
            schema_defaults
        } else {
            Values::new()
        };
        result.merge(&base);
        result
    }
}

/// Resolve a path of keys against a JSON tree
///
/// Objects are indexed by key, arrays by a decimal segment. Shared with the
/// template evaluator so `.Values.a.0.b` and `Values::get("a.0.b")` agree.
pub fn lookup<'a, S: AsRef<str>>(value: &'a JsonValue, path: &[S]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        let segment = segment.as_ref();
        current = match current {
            JsonValue::Object(map) => map.get(segment)?,
            JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = value {
        if remaining.is_empty() {
            map.insert((*key).to_string(), new_value);
        } else {
            let entry = map
                .entry((*key).to_string())
                .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
            set_nested(entry, remaining, new_value);
        }
    }
}

/// Parse --set arguments (key=value format)
pub fn parse_set_values(set_args: &[String]) -> Result<Values> {
    let mut values = Values::new();

    for arg in set_args {
        let (key, val) = arg.split_once('=').ok_or_else(|| CoreError::InvalidOverride {
            message: format!("Invalid --set format: '{}'. Expected key=value", arg),
        })?;

        values.set(key.trim(), parse_scalar(val))?;
    }

    Ok(values)
}

/// Type a raw override
///
/// Only booleans, `null`, JSON collections and integers without a leading zero
/// are typed. Everything else stays a string, so `image.tag=1.10` keeps its
/// trailing zero and `010` is not read as ten.
fn parse_scalar(val: &str) -> JsonValue {
    match val {
        "true" => JsonValue::Bool(true),
        "false" => JsonValue::Bool(false),
        "null" => JsonValue::Null,
        _ if val.starts_with('[') || val.starts_with('{') => {
            serde_json::from_str(val).unwrap_or_else(|_| JsonValue::String(val.to_string()))
        }
        _ => match val.parse::<i64>() {
            Ok(num) if !has_leading_zero(val) => JsonValue::Number(num.into()),
            _ => JsonValue::String(val.to_string()),
        },
    }
}

fn has_leading_zero(val: &str) -> bool {
    let digits = val.trim_start_matches(['-', '+']);
    digits.len() > 1 && digits.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_merge() {
        let mut base = Values::from_yaml(
            r#"
image:
  repository: registry/backend
  tag: "1.0"
replicaCount: 1
"#,
        )
        .unwrap();

        let overlay = Values::from_yaml(
            r#"
image:
  tag: "2.0"
  pullPolicy: Always
replicaCount: 3
"#,
        )
        .unwrap();

        base.merge(&overlay);

        assert_eq!(base.get("image.repository").unwrap(), "registry/backend");
        assert_eq!(base.get("image.tag").unwrap(), "2.0");
        assert_eq!(base.get("image.pullPolicy").unwrap(), "Always");
        assert_eq!(base.get("replicaCount").unwrap(), 3);
    }

    #[test]
    fn test_merge_replaces_arrays() {
        let mut base = Values::from_yaml("ports: [80, 443]").unwrap();
        base.merge(&Values::from_yaml("ports: [5000]").unwrap());
        assert_eq!(base.get("ports").unwrap(), &serde_json::json!([5000]));
    }

    #[test]
    fn test_merge_all_order() {
        let merged = Values::merge_all(vec![
            Values::from_yaml("a: 1\nb: 1").unwrap(),
            Values::from_yaml("b: 2").unwrap(),
        ]);
        assert_eq!(merged.get("a").unwrap(), 1);
        assert_eq!(merged.get("b").unwrap(), 2);
    }

    #[test]
    fn test_set_nested() {
        let mut values = Values::new();
        values
            .set("image.tag", JsonValue::String("v1".into()))
            .unwrap();
        values
            .set("replicaCount", JsonValue::Number(3.into()))
            .unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v1");
        assert_eq!(values.get("replicaCount").unwrap(), 3);
    }

    #[test]
    fn test_set_rejects_empty_segment() {
        let mut values = Values::new();
        assert!(values.set("image..tag", JsonValue::Null).is_err());
    }

    #[test]
    fn test_get_array_index() {
        let values = Values::from_yaml(
            r#"
containers:
  - name: backend
  - name: sidecar
"#,
        )
        .unwrap();
        assert_eq!(values.get("containers.1.name").unwrap(), "sidecar");
        assert!(values.get("containers.2.name").is_none());
        assert!(values.get("containers.x").is_none());
    }

    #[test]
    fn test_empty_yaml_is_empty_values() {
        let values = Values::from_yaml("").unwrap();
        assert!(values.is_empty());
        assert!(values.inner().is_object());
    }

    #[test]
    fn test_parse_set_values() {
        let args = vec![
            "image.tag=v2".to_string(),
            "replicaCount=5".to_string(),
            "debug=true".to_string(),
            "ratio=0.5".to_string(),
            "labels={\"tier\":\"api\"}".to_string(),
        ];

        let values = parse_set_values(&args).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v2");
        assert_eq!(values.get("replicaCount").unwrap(), 5);
        assert_eq!(values.get("debug").unwrap(), true);
        assert_eq!(values.get("ratio").unwrap(), "0.5");
        assert_eq!(values.get("labels.tier").unwrap(), "api");
    }

    #[test]
    fn test_parse_set_values_keeps_version_like_text() {
        let args = vec![
            "image.tag=1.10".to_string(),
            "image.digest=010".to_string(),
            "port=-8080".to_string(),
            "zero=0".to_string(),
            "big=1e3".to_string(),
        ];

        let values = parse_set_values(&args).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "1.10");
        assert_eq!(values.get("image.digest").unwrap(), "010");
        assert_eq!(values.get("port").unwrap(), -8080);
        assert_eq!(values.get("zero").unwrap(), 0);
        assert_eq!(values.get("big").unwrap(), "1e3");
    }

    #[test]
    fn test_parse_set_values_invalid() {
        let err = parse_set_values(&["replicaCount".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Expected key=value"));
    }

    #[test]
    fn test_with_schema_defaults() {
        let defaults = Values::from_yaml("replicaCount: 1\nimage:\n  pullPolicy: IfNotPresent").unwrap();
        let base = Values::from_yaml("replicaCount: 3").unwrap();

        let result = Values::with_schema_defaults(defaults, base);
        assert_eq!(result.get("replicaCount").unwrap(), 3);
        assert_eq!(result.get("image.pullPolicy").unwrap(), "IfNotPresent");
    }
}
