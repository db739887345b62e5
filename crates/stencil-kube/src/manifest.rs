//! Splitting rendered output into Kubernetes objects

use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{ManifestError, Result};

/// One non-empty YAML document of a rendered manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 1-based position among the documents of the manifest
    pub index: usize,
    pub value: JsonValue,
}

impl Document {
    /// The object identity, if `kind` and `metadata.name` are strings
    pub fn object_ref(&self) -> Option<ObjectRef> {
        let kind = self.value.get("kind")?.as_str()?;
        let name = self.value.pointer("/metadata/name")?.as_str()?;
        Some(ObjectRef {
            api_version: self
                .value
                .get("apiVersion")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: self
                .value
                .pointer("/metadata/namespace")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

/// Identity of a Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ObjectRef {
    /// API group, empty for the core group
    ///
    /// - "apps/v1" -> "apps"
    /// - "v1" -> ""
    pub fn group(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map(|(group, _)| group)
            .unwrap_or_default()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Split a manifest on `---` separator lines and parse each document
///
/// Documents that are empty, comment-only or `null` are skipped, the way
/// `kubectl apply` skips them.
pub fn split_documents(manifest: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for (position, raw) in separate(manifest).into_iter().enumerate() {
        let index = position + 1;
        let is_blank = raw
            .lines()
            .all(|l| l.trim().is_empty() || l.trim_start().starts_with('#'));
        if is_blank {
            continue;
        }

        let value: JsonValue = serde_yaml::from_str(&raw)
            .map_err(|source| ManifestError::Yaml { document: index, source })?;

        match value {
            JsonValue::Null => continue,
            JsonValue::Object(_) => documents.push(Document { index, value }),
            other => {
                return Err(ManifestError::NotAMapping {
                    document: index,
                    found: json_type_name(&other),
                });
            }
        }
    }

    Ok(documents)
}

/// Break text on lines that consist solely of `---`
fn separate(manifest: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    for line in manifest.lines() {
        if line.trim_end() == "---" {
            parts.push(String::new());
            continue;
        }
        if let Some(current) = parts.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    parts
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multiple_documents() {
        let manifest = r#"
# leading comment
apiVersion: v1
kind: ConfigMap
metadata:
  name: cm1
---
---
# only a comment
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: backend
  namespace: prod
"#;
        let docs = split_documents(manifest).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].index, 1);
        assert_eq!(docs[1].index, 4);

        let object = docs[1].object_ref().unwrap();
        assert_eq!(object.to_string(), "Deployment/backend");
        assert_eq!(object.group(), "apps");
        assert_eq!(object.namespace.as_deref(), Some("prod"));
        assert_eq!(docs[0].object_ref().unwrap().group(), "");
    }

    #[test]
    fn test_separator_inside_value_is_not_split() {
        let manifest = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\ndata:\n  banner: \"--- hi ---\"\n";
        let docs = split_documents(manifest).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].value["data"]["banner"], "--- hi ---");
    }

    #[test]
    fn test_invalid_yaml_reports_document() {
        let manifest = "kind: A\n---\nkind: [unclosed\n";
        let err = split_documents(manifest).unwrap_err();
        assert!(matches!(err, ManifestError::Yaml { document: 2, .. }));
    }

    #[test]
    fn test_scalar_document_rejected() {
        let err = split_documents("just a string").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::NotAMapping { document: 1, found: "a string" }
        ));
    }

    #[test]
    fn test_empty_manifest() {
        assert!(split_documents("").unwrap().is_empty());
        assert!(split_documents("---\n\n---\n").unwrap().is_empty());
    }
}
