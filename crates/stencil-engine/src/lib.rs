//! Stencil Engine - Go-template substitution for Kubernetes manifests
//!
//! This crate renders templates written in the substitution subset of Go
//! template syntax with:
//! - A pest grammar for `{{ pipelines }}`, trim markers and comments
//! - Kubernetes-oriented functions (toYaml, nindent, quote, default, etc.)
//! - Strict mode that fails on undefined values, with typo suggestions
//! - Validation of every rendered manifest against the Kubernetes object schema
//! - Multi-error collection for comprehensive error reporting

pub mod ast;
pub mod engine;
pub mod error;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod renderer;
pub mod suggestions;

pub use engine::{Engine, EngineBuilder, RenderResult};
pub use error::{EngineError, RenderReport, RenderResultWithReport, TemplateError, TemplateErrorKind};
pub use eval::{EvalError, Evaluator, Value};
pub use functions::{FunctionError, FunctionRegistry, FunctionResult};
pub use parser::{ParseError, parse};
pub use renderer::{RenderedTemplate, Renderer};
