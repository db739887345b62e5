//! Schema validation for values
//!
//! Two formats are accepted:
//! - Standard JSON Schema (`values.schema.json`)
//! - Simplified Stencil schema (`schemaVersion: stencil/v1`), compiled to JSON Schema

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result, ValidationErrorInfo};
use crate::values::Values;

/// Identifier of the simplified schema format
pub const SIMPLE_SCHEMA_VERSION: &str = "stencil/v1";

/// Property type in the simplified format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SimpleType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl SimpleType {
    fn json_schema_name(self) -> Option<&'static str> {
        match self {
            SimpleType::String => Some("string"),
            SimpleType::Number => Some("number"),
            SimpleType::Integer => Some("integer"),
            SimpleType::Boolean => Some("boolean"),
            SimpleType::Array => Some("array"),
            SimpleType::Object => Some("object"),
            SimpleType::Any => None,
        }
    }
}

/// A single property in the simplified format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleProperty {
    #[serde(rename = "type")]
    pub prop_type: SimpleType,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub default: Option<JsonValue>,

    #[serde(default)]
    pub required: bool,

    /// Allowed values
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<JsonValue>>,

    /// Regex for strings
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub min: Option<f64>,

    #[serde(default)]
    pub max: Option<f64>,

    #[serde(default)]
    pub min_length: Option<usize>,

    #[serde(default)]
    pub max_length: Option<usize>,

    #[serde(default)]
    pub properties: Option<BTreeMap<String, SimpleProperty>>,

    #[serde(default)]
    pub items: Option<Box<SimpleProperty>>,

    #[serde(default)]
    pub min_items: Option<usize>,

    #[serde(default)]
    pub max_items: Option<usize>,
}

/// Root of a simplified schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleSchema {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    pub properties: BTreeMap<String, SimpleProperty>,
}

fn default_schema_version() -> String {
    SIMPLE_SCHEMA_VERSION.to_string()
}

/// Unified schema that handles both formats
#[derive(Debug, Clone)]
pub enum Schema {
    JsonSchema(JsonValue),
    Simple(SimpleSchema),
}

impl Schema {
    /// Load schema from a file, auto-detecting format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json_file = path.extension().is_some_and(|e| e == "json");
        let value: JsonValue = if is_json_file {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidSchema {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?
        };

        if is_json_file || looks_like_json_schema(&value) {
            Ok(Schema::JsonSchema(value))
        } else {
            let simple: SimpleSchema = serde_json::from_value(value)?;
            Ok(Schema::Simple(simple))
        }
    }

    /// Load from JSON Schema string
    pub fn from_json_schema(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Ok(Schema::JsonSchema(value))
    }

    /// Load from simplified schema YAML string
    pub fn from_simple_schema(yaml: &str) -> Result<Self> {
        let simple: SimpleSchema = serde_yaml::from_str(yaml)?;
        Ok(Schema::Simple(simple))
    }

    /// Convert to JSON Schema for validation
    pub fn to_json_schema(&self) -> JsonValue {
        match self {
            Schema::JsonSchema(v) => v.clone(),
            Schema::Simple(s) => convert_simple_schema(s),
        }
    }

    /// Extract defaults from the schema
    pub fn extract_defaults(&self) -> JsonValue {
        match self {
            Schema::JsonSchema(v) => extract_json_schema_defaults(v),
            Schema::Simple(s) => extract_simple_defaults(&s.properties),
        }
    }

    /// Get defaults as Values
    pub fn defaults_as_values(&self) -> Values {
        match self.extract_defaults() {
            JsonValue::Null => Values::new(),
            other => Values(other),
        }
    }
}

/// JSON Schema markers: `$schema`, `$id`, or a root `type: object`
///
/// Anything else is read as the simplified format.
fn looks_like_json_schema(value: &JsonValue) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let simple_marker = obj
        .get("schemaVersion")
        .and_then(|v| v.as_str())
        .is_some_and(|s| s.starts_with("stencil/"));
    if simple_marker {
        return false;
    }

    obj.contains_key("$schema")
        || obj.contains_key("$id")
        || obj.get("type").and_then(|t| t.as_str()) == Some("object")
}

fn convert_simple_schema(simple: &SimpleSchema) -> JsonValue {
    let mut schema = serde_json::Map::new();

    schema.insert(
        "$schema".into(),
        JsonValue::String("http://json-schema.org/draft-07/schema#".into()),
    );
    schema.insert("type".into(), JsonValue::String("object".into()));

    if let Some(title) = &simple.title {
        schema.insert("title".into(), JsonValue::String(title.clone()));
    }
    if let Some(desc) = &simple.description {
        schema.insert("description".into(), JsonValue::String(desc.clone()));
    }

    insert_properties(&mut schema, &simple.properties);
    JsonValue::Object(schema)
}

fn insert_properties(
    target: &mut serde_json::Map<String, JsonValue>,
    props: &BTreeMap<String, SimpleProperty>,
) {
    let mut json_props = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, prop) in props {
        json_props.insert(name.clone(), convert_property(prop));
        if prop.required {
            required.push(JsonValue::String(name.clone()));
        }
    }

    target.insert("properties".into(), JsonValue::Object(json_props));
    if !required.is_empty() {
        target.insert("required".into(), JsonValue::Array(required));
    }
}

fn convert_property(prop: &SimpleProperty) -> JsonValue {
    let mut json = serde_json::Map::new();

    if let Some(type_name) = prop.prop_type.json_schema_name() {
        json.insert("type".into(), JsonValue::String(type_name.into()));
    }

    if let Some(desc) = &prop.description {
        json.insert("description".into(), JsonValue::String(desc.clone()));
    }
    if let Some(default) = &prop.default {
        json.insert("default".into(), default.clone());
    }
    if let Some(enum_vals) = &prop.enum_values {
        json.insert("enum".into(), JsonValue::Array(enum_vals.clone()));
    }
    if let Some(pattern) = &prop.pattern {
        json.insert("pattern".into(), JsonValue::String(pattern.clone()));
    }

    if let Some(min) = prop.min {
        json.insert("minimum".into(), JsonValue::from(min));
    }
    if let Some(max) = prop.max {
        json.insert("maximum".into(), JsonValue::from(max));
    }
    if let Some(min_len) = prop.min_length {
        json.insert("minLength".into(), JsonValue::from(min_len));
    }
    if let Some(max_len) = prop.max_length {
        json.insert("maxLength".into(), JsonValue::from(max_len));
    }

    if let Some(nested) = &prop.properties {
        insert_properties(&mut json, nested);
    }

    if let Some(items) = &prop.items {
        json.insert("items".into(), convert_property(items));
    }
    if let Some(min_items) = prop.min_items {
        json.insert("minItems".into(), JsonValue::from(min_items));
    }
    if let Some(max_items) = prop.max_items {
        json.insert("maxItems".into(), JsonValue::from(max_items));
    }

    JsonValue::Object(json)
}

fn extract_json_schema_defaults(schema: &JsonValue) -> JsonValue {
    let Some(obj) = schema.as_object() else {
        return JsonValue::Null;
    };

    if let Some(default) = obj.get("default") {
        return default.clone();
    }

    if let Some(props) = obj.get("properties").and_then(|p| p.as_object()) {
        let defaults: serde_json::Map<String, JsonValue> = props
            .iter()
            .filter_map(|(key, prop_schema)| {
                let value = extract_json_schema_defaults(prop_schema);
                (!value.is_null()).then(|| (key.clone(), value))
            })
            .collect();

        if !defaults.is_empty() {
            return JsonValue::Object(defaults);
        }
    }

    JsonValue::Null
}

fn extract_simple_defaults(props: &BTreeMap<String, SimpleProperty>) -> JsonValue {
    let mut defaults = serde_json::Map::new();

    for (name, prop) in props {
        if let Some(default) = &prop.default {
            defaults.insert(name.clone(), default.clone());
        } else if let Some(nested) = &prop.properties {
            let nested_defaults = extract_simple_defaults(nested);
            if !nested_defaults.is_null() {
                defaults.insert(name.clone(), nested_defaults);
            }
        }
    }

    if defaults.is_empty() {
        JsonValue::Null
    } else {
        JsonValue::Object(defaults)
    }
}

/// Result of schema validation
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationErrorInfo>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn failure(errors: Vec<ValidationErrorInfo>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// Schema validator with cached compiled schema
pub struct SchemaValidator {
    schema: Schema,
    compiled: jsonschema::Validator,
    defaults: JsonValue,
}

impl SchemaValidator {
    /// Compile a schema
    pub fn new(schema: Schema) -> Result<Self> {
        let json_schema = schema.to_json_schema();
        let defaults = schema.extract_defaults();

        let compiled =
            jsonschema::validator_for(&json_schema).map_err(|e| CoreError::InvalidSchema {
                message: format!("Invalid schema: {}", e),
            })?;

        Ok(Self {
            schema,
            compiled,
            defaults,
        })
    }

    /// Validate values, collecting every violation
    pub fn validate(&self, values: &JsonValue) -> ValidationResult {
        if self.compiled.is_valid(values) {
            return ValidationResult::success();
        }

        let errors: Vec<ValidationErrorInfo> = self
            .compiled
            .iter_errors(values)
            .map(|e| {
                let path = e.instance_path.to_string();
                ValidationErrorInfo {
                    path: if path.is_empty() {
                        "(root)".to_string()
                    } else {
                        path
                    },
                    message: e.to_string().replace('"', "'"),
                }
            })
            .collect();

        ValidationResult::failure(errors)
    }

    pub fn defaults(&self) -> &JsonValue {
        &self.defaults
    }

    pub fn defaults_as_values(&self) -> Values {
        match &self.defaults {
            JsonValue::Null => Values::new(),
            other => Values(other.clone()),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}
