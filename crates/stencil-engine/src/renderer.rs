//! Renderer: parse, evaluate, then validate the output

use serde_json::Value as JsonValue;
use stencil_kube::{ManifestValidator, ValidationReport};
use tracing::{debug, trace};

use crate::error::{EngineError, Result, TemplateError};
use crate::eval::Evaluator;
use crate::functions::FunctionRegistry;
use crate::parser::parse;

/// Output of a single template
#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    pub name: String,
    pub output: String,
    /// Findings for the output; never contains errors when returned by `render`
    pub validation: ValidationReport,
}

/// Walks a template AST and validates what it produced
pub struct Renderer<'a> {
    functions: &'a FunctionRegistry,
    strict: bool,
    validator: Option<ManifestValidator>,
}

impl<'a> Renderer<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Self {
            functions,
            strict: true,
            validator: Some(ManifestValidator::new()),
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable manifest validation
    pub fn validate(mut self, validate: bool) -> Self {
        self.validator = validate.then(ManifestValidator::new);
        self
    }

    /// Parse and evaluate a template without validating the result
    pub fn render_text(
        &self,
        name: &str,
        source: &str,
        context: &JsonValue,
    ) -> std::result::Result<String, TemplateError> {
        let template = parse(source).map_err(|e| TemplateError::from_parse(&e, name, source))?;
        trace!(template = name, nodes = template.nodes.len(), "parsed template");

        Evaluator::new(context, self.functions)
            .strict(self.strict)
            .render(&template)
            .map_err(|e| TemplateError::from_eval(&e, name, source))
    }

    /// Render a template and validate its output
    ///
    /// Validation errors fail the render; warnings travel with the result.
    pub fn render(&self, name: &str, source: &str, context: &JsonValue) -> Result<RenderedTemplate> {
        let output = self.render_text(name, source, context)?;
        let validation = self.check(name, &output);

        if validation.has_errors() {
            return Err(EngineError::Validation {
                template: name.to_string(),
                report: validation,
            });
        }

        Ok(RenderedTemplate {
            name: name.to_string(),
            output,
            validation,
        })
    }

    /// Validate rendered output, or return an empty report when disabled
    pub fn check(&self, name: &str, output: &str) -> ValidationReport {
        match &self.validator {
            Some(validator) => {
                let report = validator.validate(name, output);
                debug!(
                    template = name,
                    documents = report.validated_count,
                    issues = report.issues.len(),
                    "validated output"
                );
                report
            }
            None => ValidationReport::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONFIGMAP: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ .Values.name }}\n";

    #[test]
    fn test_render_and_validate() {
        let functions = FunctionRegistry::with_builtins();
        let rendered = Renderer::new(&functions)
            .render("cm.yaml", CONFIGMAP, &json!({"Values": {"name": "settings"}}))
            .unwrap();
        assert_eq!(rendered.output, "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n");
        assert!(rendered.validation.is_empty());
    }

    #[test]
    fn test_invalid_output_fails() {
        let functions = FunctionRegistry::with_builtins();
        let err = Renderer::new(&functions)
            .render("cm.yaml", CONFIGMAP, &json!({"Values": {"name": "Not_Valid"}}))
            .unwrap_err();
        match err {
            EngineError::Validation { template, report } => {
                assert_eq!(template, "cm.yaml");
                assert_eq!(report.errors().next().unwrap().path, "metadata.name");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let functions = FunctionRegistry::with_builtins();
        let rendered = Renderer::new(&functions)
            .validate(false)
            .render("cm.yaml", CONFIGMAP, &json!({"Values": {"name": "Not_Valid"}}))
            .unwrap();
        assert!(rendered.output.contains("Not_Valid"));
    }

    #[test]
    fn test_lenient_mode() {
        let functions = FunctionRegistry::with_builtins();
        let output = Renderer::new(&functions)
            .strict(false)
            .render_text("x", "a: {{ .Values.missing }}", &json!({"Values": {}}))
            .unwrap();
        assert_eq!(output, "a: ");
    }
}
