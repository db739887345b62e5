//! Stencil Core - Core types for the manifest template engine
//!
//! This crate provides the foundational types used throughout Stencil:
//! - `Values`: The value store, a configuration tree with deep merge and dotted-path access
//! - `TemplateContext`: The root object templates are evaluated against
//! - `LoadedBundle`: A directory of templates with default values and an optional schema
//! - `Schema`: Values schema validation

pub mod bundle;
pub mod context;
pub mod error;
pub mod schema;
pub mod values;

pub use bundle::{Bundle, BundleMetadata, EngineConfig, LoadedBundle};
pub use context::{ReleaseInfo, TemplateContext, TemplateInfo};
pub use error::{CoreError, ValidationErrorInfo};
pub use schema::{Schema, SchemaValidator, SimpleProperty, SimpleSchema, SimpleType, ValidationResult};
pub use values::{Values, parse_set_values};
