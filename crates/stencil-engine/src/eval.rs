//! Expression evaluator
//!
//! Resolves field paths against the render context, calls functions and
//! prints results. Undefined fields travel as [`Value::Missing`] until they
//! are printed or handed to a function, which is where strict and lenient
//! mode differ.

use serde_json::Value as JsonValue;
use stencil_core::values::lookup;
use thiserror::Error;
use tracing::trace;

use crate::ast::*;
use crate::functions::{FunctionRegistry, print_value};
use crate::suggestions::{suggest_missing_field, suggest_unknown_function};

/// Evaluation error
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("undefined variable `{path}`")]
    UndefinedVariable {
        path: String,
        span: Span,
        suggestion: Option<String>,
    },

    #[error("unknown function `{name}`")]
    UnknownFunction {
        name: String,
        span: Span,
        suggestion: Option<String>,
    },

    #[error("error calling {name}: {message}")]
    Function {
        name: String,
        message: String,
        span: Span,
    },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable { span, .. }
            | Self::UnknownFunction { span, .. }
            | Self::Function { span, .. } => *span,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

/// Result of evaluating an operand or pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Defined(JsonValue),
    /// A field path that did not resolve
    Missing(FieldPath),
}

/// Evaluates parsed templates against a context
pub struct Evaluator<'a> {
    root: &'a JsonValue,
    functions: &'a FunctionRegistry,
    strict: bool,
}

impl<'a> Evaluator<'a> {
    /// Create a strict evaluator
    pub fn new(root: &'a JsonValue, functions: &'a FunctionRegistry) -> Self {
        Self {
            root,
            functions,
            strict: true,
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Render a template to text
    pub fn render(&self, template: &Template) -> Result<String> {
        let mut output = String::new();

        for node in &template.nodes {
            match node {
                Node::Text(text) => output.push_str(text),
                Node::Action(action) => {
                    let value = self.eval_pipeline(&action.pipeline)?;
                    output.push_str(&print_value(&self.into_json(value, false)?));
                }
            }
        }

        Ok(output)
    }

    /// Evaluate a pipeline, feeding each result into the next command
    pub fn eval_pipeline(&self, pipeline: &Pipeline) -> Result<Value> {
        let mut piped: Option<Value> = None;

        for command in &pipeline.commands {
            let value = match command {
                Command::Call(call) => self.call(call, piped.take())?,
                Command::Operand(operand) => self.eval_operand(operand)?,
            };
            piped = Some(value);
        }

        Ok(piped.unwrap_or(Value::Defined(JsonValue::Null)))
    }

    fn eval_operand(&self, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Field(path) => Ok(self.resolve(path)),
            Operand::Literal(literal) => Ok(Value::Defined(literal_to_json(literal))),
            Operand::Call(call) => self.call(call, None),
            Operand::Pipeline(pipeline) => self.eval_pipeline(pipeline),
        }
    }

    /// `.` and `$` both name the root, as there are no nested scopes
    fn resolve(&self, path: &FieldPath) -> Value {
        match lookup(self.root, &path.segments) {
            Some(value) => Value::Defined(value.clone()),
            None => Value::Missing(path.clone()),
        }
    }

    fn call(&self, call: &Call, piped: Option<Value>) -> Result<Value> {
        let Some(function) = self.functions.get(&call.name) else {
            return Err(EvalError::UnknownFunction {
                name: call.name.clone(),
                span: call.span,
                suggestion: suggest_unknown_function(&call.name, &self.functions.names()),
            });
        };

        let mut args = Vec::with_capacity(call.args.len() + 1);
        for operand in &call.args {
            let value = self.eval_operand(operand)?;
            args.push(self.into_json(value, function.accepts_missing())?);
        }
        if let Some(value) = piped {
            args.push(self.into_json(value, function.accepts_missing())?);
        }

        function
            .call(&args)
            .map(Value::Defined)
            .map_err(|e| EvalError::Function {
                name: call.name.clone(),
                message: e.message,
                span: call.span,
            })
    }

    /// Collapse a missing value to `null`, or fail in strict mode
    fn into_json(&self, value: Value, accepts_missing: bool) -> Result<JsonValue> {
        match value {
            Value::Defined(value) => Ok(value),
            Value::Missing(path) if accepts_missing || !self.strict => {
                trace!(path = %path, "undefined variable treated as null");
                Ok(JsonValue::Null)
            }
            Value::Missing(path) => Err(EvalError::UndefinedVariable {
                suggestion: suggest_missing_field(self.root, &path),
                path: path.to_string(),
                span: path.span,
            }),
        }
    }
}

fn literal_to_json(literal: &Literal) -> JsonValue {
    match literal {
        Literal::String(s) => JsonValue::String(s.clone()),
        Literal::Int(n) => JsonValue::from(*n),
        Literal::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Literal::Bool(b) => JsonValue::Bool(*b),
        Literal::Nil => JsonValue::Null,
    }
}
