//! Engine error types with source-annotated diagnostics

use indexmap::IndexMap;
use miette::{Diagnostic, NamedSource, SourceSpan};
use stencil_core::CoreError;
use stencil_kube::ValidationReport;
use thiserror::Error;

use crate::eval::EvalError;
use crate::parser::ParseError;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("{template}: rendered manifest failed validation ({} error(s))", .report.summary().0)]
    #[diagnostic(
        code(stencil::validation),
        help("fix the values or the template so the output is a valid Kubernetes object")
    )]
    Validation {
        template: String,
        report: ValidationReport,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFunction,
    SyntaxError,
    FunctionError,
    Other,
}

impl TemplateErrorKind {
    /// Convert to a code string for diagnostics
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::FunctionError => "function",
            Self::Other => "render",
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(stencil::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Error kind for categorization
    pub kind: TemplateErrorKind,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Build from a parse failure
    pub fn from_parse(err: &ParseError, template_name: &str, template_source: &str) -> Self {
        let suggestion = match err {
            ParseError::Syntax { .. } => {
                Some("Check that every `{{` has a matching `}}` and that strings are closed.".to_string())
            }
            ParseError::UnsupportedAction { .. } => Some(
                "Only value substitution is available. Move the condition into values or render separate templates."
                    .to_string(),
            ),
            ParseError::PipeIntoNonFunction { .. } => {
                Some("Follow `|` with a function name, e.g. `{{ .Values.name | quote }}`.".to_string())
            }
            ParseError::InvalidNumber { .. } | ParseError::UnexpectedRule(_) => None,
        };

        Self {
            message: err.to_string(),
            kind: TemplateErrorKind::SyntaxError,
            src: NamedSource::new(template_name, template_source.to_string()),
            span: err.span().map(|s| clamp_span(s.start, s.len(), template_source)),
            suggestion,
        }
    }

    /// Build from an evaluation failure
    pub fn from_eval(err: &EvalError, template_name: &str, template_source: &str) -> Self {
        let (kind, suggestion) = match err {
            EvalError::UndefinedVariable { suggestion, .. } => {
                (TemplateErrorKind::UndefinedVariable, suggestion.clone())
            }
            EvalError::UnknownFunction { suggestion, .. } => {
                (TemplateErrorKind::UnknownFunction, suggestion.clone())
            }
            EvalError::Function { .. } => (TemplateErrorKind::FunctionError, None),
        };
        let span = err.span();

        Self {
            message: err.to_string(),
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span: Some(clamp_span(span.start, span.len(), template_source)),
            suggestion,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }

    /// 1-based line of the error, if it has a location
    pub fn line(&self) -> Option<usize> {
        let offset = self.span?.offset();
        let source = self.src.inner();
        Some(source[..offset.min(source.len())].matches('\n').count() + 1)
    }
}

/// Keep spans inside the source so miette can render them
fn clamp_span(start: usize, len: usize, source: &str) -> SourceSpan {
    let start = start.min(source.len());
    let len = len.min(source.len() - start);
    SourceSpan::new(start.into(), len)
}

/// A collection of errors from rendering multiple templates
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Errors grouped by template file (IndexMap preserves insertion order)
    pub errors_by_template: IndexMap<String, Vec<TemplateError>>,

    /// Successfully rendered templates
    pub successful_templates: Vec<String>,

    /// Total error count
    pub total_errors: usize,
}

impl RenderReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error for a specific template
    pub fn add_error(&mut self, template_name: String, error: TemplateError) {
        self.errors_by_template
            .entry(template_name)
            .or_default()
            .push(error);
        self.total_errors += 1;
    }

    /// Mark a template as successfully rendered
    pub fn add_success(&mut self, template_name: String) {
        self.successful_templates.push(template_name);
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Get count of templates with errors
    pub fn templates_with_errors(&self) -> usize {
        self.errors_by_template.len()
    }

    /// Generate summary message: "5 errors in 3 templates"
    pub fn summary(&self) -> String {
        let template_word = if self.templates_with_errors() == 1 {
            "template"
        } else {
            "templates"
        };
        let error_word = if self.total_errors == 1 { "error" } else { "errors" };
        format!(
            "{} {} in {} {}",
            self.total_errors,
            error_word,
            self.templates_with_errors(),
            template_word
        )
    }
}

/// Rendered manifests together with every error found along the way
#[derive(Debug)]
pub struct RenderResultWithReport {
    /// Rendered manifests (partial if errors occurred), in template order
    pub manifests: IndexMap<String, String>,

    /// Manifest validation findings for the rendered templates
    pub validation: ValidationReport,

    /// Template errors (empty if all templates rendered successfully)
    pub report: RenderReport,
}

impl RenderResultWithReport {
    /// Check if rendering was fully successful (no errors)
    pub fn is_success(&self) -> bool {
        !self.report.has_errors() && !self.validation.has_errors()
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_render_report_summary_singular() {
        let mut report = RenderReport::new();
        report.add_error("deployment.yaml".to_string(), TemplateError::simple("error"));

        assert!(report.has_errors());
        assert_eq!(report.summary(), "1 error in 1 template");
    }

    #[test]
    fn test_render_report_summary_plural() {
        let mut report = RenderReport::new();
        report.add_error("a.yaml".to_string(), TemplateError::simple("error 1"));
        report.add_error("a.yaml".to_string(), TemplateError::simple("error 2"));
        report.add_error("b.yaml".to_string(), TemplateError::simple("error 3"));

        assert_eq!(report.total_errors, 3);
        assert_eq!(report.errors_by_template["a.yaml"].len(), 2);
        assert_eq!(report.summary(), "3 errors in 2 templates");
    }

    #[test]
    fn test_render_report_keeps_template_order() {
        let mut report = RenderReport::new();
        report.add_error("z.yaml".to_string(), TemplateError::simple("late"));
        report.add_error("a.yaml".to_string(), TemplateError::simple("early"));
        let names: Vec<&String> = report.errors_by_template.keys().collect();
        assert_eq!(names, vec!["z.yaml", "a.yaml"]);
    }

    #[test]
    fn test_from_parse_error() {
        let source = "kind: Deployment\nname: {{ if .Values.x }}\n";
        let err = parse(source).unwrap_err();
        let template_err = TemplateError::from_parse(&err, "deployment.yaml", source);

        assert_eq!(template_err.kind(), TemplateErrorKind::SyntaxError);
        assert_eq!(template_err.line(), Some(2));
        assert!(template_err.suggestion.unwrap().contains("Only value substitution"));
    }

    #[test]
    fn test_from_eval_error() {
        let source = "a: {{ .Values.x }}";
        let err = EvalError::UndefinedVariable {
            path: ".Values.x".to_string(),
            span: crate::ast::Span::new(6, 15),
            suggestion: Some("Did you mean `.Values.y`?".to_string()),
        };
        let template_err = TemplateError::from_eval(&err, "cm.yaml", source);

        assert_eq!(template_err.kind().to_code_string(), "undefined_variable");
        assert_eq!(template_err.message, "undefined variable `.Values.x`");
        assert_eq!(template_err.span, Some(SourceSpan::new(6.into(), 9)));
        assert_eq!(template_err.line(), Some(1));
    }

    #[test]
    fn test_span_is_clamped() {
        let span = clamp_span(40, 10, "short");
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 0);
    }

    #[test]
    fn test_with_suggestion() {
        let error = TemplateError::simple("test").with_suggestion("try this");
        assert_eq!(error.suggestion, Some("try this".to_string()));
        assert_eq!(error.kind(), TemplateErrorKind::Other);
    }
}
