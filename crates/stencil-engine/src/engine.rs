//! Template engine: configuration and bundle rendering

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use stencil_core::{EngineConfig, LoadedBundle, TemplateContext};
use stencil_kube::ValidationReport;
use tracing::{debug, warn};

use crate::error::{RenderReport, RenderResultWithReport, Result, TemplateError};
use crate::functions::{FunctionRegistry, FunctionResult};
use crate::renderer::Renderer;

/// Result of rendering a bundle
#[derive(Debug)]
pub struct RenderResult {
    /// Rendered manifests by template name, in template order
    pub manifests: IndexMap<String, String>,

    /// Validation warnings for the rendered manifests
    pub validation: ValidationReport,
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
    validate: bool,
    functions: FunctionRegistry,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            strict_mode: true,
            validate: true,
            functions: FunctionRegistry::with_builtins(),
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Validate rendered output against the Kubernetes object schema
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Apply the `engine` section of a bundle file
    pub fn config(self, config: &EngineConfig) -> Self {
        self.strict(config.strict).validate(config.validate)
    }

    /// Register an extra template function
    pub fn function<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[JsonValue]) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.register(name, func);
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        Engine {
            strict_mode: self.strict_mode,
            validate: self.validate,
            functions: self.functions,
        }
    }
}

/// The template engine
#[derive(Debug)]
pub struct Engine {
    strict_mode: bool,
    validate: bool,
    functions: FunctionRegistry,
}

impl Engine {
    /// Create an engine with the built-in functions and validation enabled
    pub fn new(strict_mode: bool) -> Self {
        EngineBuilder::new().strict(strict_mode).build()
    }

    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer::new(&self.functions)
            .strict(self.strict_mode)
            .validate(self.validate)
    }

    /// Render a single template string
    pub fn render_string(
        &self,
        template: &str,
        context: &TemplateContext,
        template_name: &str,
    ) -> Result<String> {
        let ctx = context.clone().with_template(template_name, "").to_json();
        let rendered = self.renderer().render(template_name, template, &ctx)?;

        for issue in rendered.validation.warnings() {
            warn!("{}", issue);
        }
        Ok(rendered.output)
    }

    /// Render all templates in a bundle
    ///
    /// Stops at the first template or validation error.
    pub fn render_bundle(
        &self,
        bundle: &LoadedBundle,
        context: &TemplateContext,
    ) -> Result<RenderResult> {
        let template_files = bundle.template_files()?;
        let base_path = bundle.templates_dir.display().to_string();
        let renderer = self.renderer();

        let mut manifests = IndexMap::new();
        let mut validation = ValidationReport::new();

        for file_path in &template_files {
            let template_name = bundle.template_name(file_path);
            let content = std::fs::read_to_string(file_path)?;
            let ctx = context
                .clone()
                .with_template(&template_name, &base_path)
                .to_json();

            let rendered = renderer.render(&template_name, &content, &ctx)?;
            debug!(template = %template_name, bytes = rendered.output.len(), "rendered template");

            validation.extend(rendered.validation);
            if !is_blank_manifest(&rendered.output) {
                manifests.insert(template_name, rendered.output);
            }
        }

        Ok(RenderResult {
            manifests,
            validation,
        })
    }

    /// Render all templates in a bundle, collecting all errors instead of stopping at the first
    ///
    /// Unlike `render_bundle`, this method continues after errors and returns
    /// a comprehensive report of all issues found.
    pub fn render_bundle_collect_errors(
        &self,
        bundle: &LoadedBundle,
        context: &TemplateContext,
    ) -> RenderResultWithReport {
        let mut report = RenderReport::new();
        let mut manifests = IndexMap::new();
        let mut validation = ValidationReport::new();

        let template_files = match bundle.template_files() {
            Ok(files) => files,
            Err(e) => {
                report.add_error(
                    "<bundle>".to_string(),
                    TemplateError::simple(format!("Failed to list templates: {}", e)),
                );
                return RenderResultWithReport {
                    manifests,
                    validation,
                    report,
                };
            }
        };

        let base_path = bundle.templates_dir.display().to_string();
        let renderer = self.renderer();

        for file_path in &template_files {
            let template_name = bundle.template_name(file_path);

            let content = match std::fs::read_to_string(file_path) {
                Ok(c) => c,
                Err(e) => {
                    report.add_error(
                        template_name,
                        TemplateError::simple(format!("Failed to read template: {}", e)),
                    );
                    continue;
                }
            };

            let ctx = context
                .clone()
                .with_template(&template_name, &base_path)
                .to_json();

            match renderer.render_text(&template_name, &content, &ctx) {
                Ok(output) => {
                    validation.extend(renderer.check(&template_name, &output));
                    if !is_blank_manifest(&output) {
                        manifests.insert(template_name.clone(), output);
                    }
                    report.add_success(template_name);
                }
                Err(e) => report.add_error(template_name, e),
            }
        }

        RenderResultWithReport {
            manifests,
            validation,
            report,
        }
    }
}

/// Output with nothing but whitespace or document separators
fn is_blank_manifest(output: &str) -> bool {
    output
        .lines()
        .all(|line| line.trim().is_empty() || line.trim() == "---")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, TemplateErrorKind};
    use serde_json::json;
    use std::fs;
    use stencil_core::{ReleaseInfo, Values};
    use tempfile::TempDir;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: backend
  namespace: {{ .Values.namespace.name }}
  labels:
    app: backend
spec:
  replicas: {{ .Values.replicaCount }}
  selector:
    matchLabels:
      app: backend
  template:
    metadata:
      labels:
        app: backend
    spec:
      containers:
        - name: backend
          image: "{{ .Values.image.repository }}:{{ .Values.image.tag }}"
          imagePullPolicy: {{ .Values.image.pullPolicy }}
          ports:
            - containerPort: 5000
          env:
            - name: API_KEY
              valueFrom:
                secretKeyRef:
                  name: api-key
                  key: API-KEY
          resources:
            {{- toYaml .Values.resources | nindent 12 }}
"#;

    const VALUES: &str = r#"
namespace:
  name: prod
replicaCount: 3
image:
  repository: registry/backend
  tag: v1.2.0
  pullPolicy: IfNotPresent
resources:
  limits:
    cpu: 500m
    memory: 256Mi
  requests:
    cpu: 250m
    memory: 128Mi
"#;

    fn context(values: &str) -> TemplateContext {
        TemplateContext::new(
            Values::from_yaml(values).unwrap(),
            ReleaseInfo::new("backend", "prod"),
        )
    }

    fn rendered_object(output: &str) -> JsonValue {
        serde_yaml::from_str(output).unwrap()
    }

    #[test]
    fn test_render_deployment_example() {
        let engine = Engine::new(true);
        let output = engine
            .render_string(DEPLOYMENT, &context(VALUES), "deployment.yaml")
            .unwrap();

        let object = rendered_object(&output);
        assert_eq!(object["metadata"]["namespace"], "prod");
        assert_eq!(object["spec"]["replicas"], 3);
        assert_eq!(
            object["spec"]["template"]["spec"]["containers"][0]["image"],
            "registry/backend:v1.2.0"
        );
        assert_eq!(
            object["spec"]["template"]["spec"]["containers"][0]["imagePullPolicy"],
            "IfNotPresent"
        );
    }

    #[test]
    fn test_replicas_match_input_exactly() {
        let engine = Engine::new(true);
        for replicas in [0, 1, 7, 250] {
            let values = VALUES.replace("replicaCount: 3", &format!("replicaCount: {}", replicas));
            let output = engine
                .render_string(DEPLOYMENT, &context(&values), "deployment.yaml")
                .unwrap();
            assert_eq!(rendered_object(&output)["spec"]["replicas"], replicas);
        }
    }

    #[test]
    fn test_rendered_deployment_snapshot() {
        let engine = Engine::new(true);
        let output = engine
            .render_string(DEPLOYMENT, &context(VALUES), "deployment.yaml")
            .unwrap();

        insta::assert_snapshot!(output, @r#"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: backend
          namespace: prod
          labels:
            app: backend
        spec:
          replicas: 3
          selector:
            matchLabels:
              app: backend
          template:
            metadata:
              labels:
                app: backend
            spec:
              containers:
                - name: backend
                  image: "registry/backend:v1.2.0"
                  imagePullPolicy: IfNotPresent
                  ports:
                    - containerPort: 5000
                  env:
                    - name: API_KEY
                      valueFrom:
                        secretKeyRef:
                          name: api-key
                          key: API-KEY
                  resources:
                    limits:
                      cpu: 500m
                      memory: 256Mi
                    requests:
                      cpu: 250m
                      memory: 128Mi
        "#);
    }

    #[test]
    fn test_undefined_value_fails_in_strict_mode() {
        let engine = Engine::new(true);
        let values = VALUES.replace("  tag: v1.2.0\n", "");
        let err = engine
            .render_string(DEPLOYMENT, &context(&values), "deployment.yaml")
            .unwrap_err();
        match err {
            EngineError::Template(e) => {
                assert_eq!(e.kind(), crate::TemplateErrorKind::UndefinedVariable);
                assert_eq!(e.message, "undefined variable `.Values.image.tag`");
                assert_eq!(e.line(), Some(20));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bad_pull_policy_fails_validation() {
        let engine = Engine::new(true);
        let values = VALUES.replace("pullPolicy: IfNotPresent", "pullPolicy: Sometimes");
        let err = engine
            .render_string(DEPLOYMENT, &context(&values), "deployment.yaml")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_wrong_type_fails_validation() {
        let engine = Engine::new(true);
        let values = VALUES.replace("replicaCount: 3", "replicaCount: three");
        let err = engine
            .render_string(DEPLOYMENT, &context(&values), "deployment.yaml")
            .unwrap_err();
        let EngineError::Validation { report, .. } = err else {
            panic!("expected a validation error");
        };
        assert!(report.errors().any(|i| i.path == "spec.replicas"));
    }

    #[test]
    fn test_request_above_limit_fails_validation() {
        let engine = Engine::new(true);
        let values = VALUES.replace("cpu: 250m", "cpu: 2");
        let err = engine
            .render_string(DEPLOYMENT, &context(&values), "deployment.yaml")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_lenient_engine_without_validation() {
        let engine = Engine::builder().strict(false).validate(false).build();
        let output = engine
            .render_string("tag: {{ .Values.image.digest }}", &context(VALUES), "x.yaml")
            .unwrap();
        assert_eq!(output, "tag: ");
    }

    #[test]
    fn test_custom_function() {
        let engine = Engine::builder()
            .validate(false)
            .function("shout", |args: &[JsonValue]| {
                let text = args.last().and_then(|v| v.as_str()).unwrap_or_default();
                Ok(json!(format!("{}!", text.to_uppercase())))
            })
            .build();
        let output = engine
            .render_string("{{ .Release.Name | shout }}", &context(VALUES), "x")
            .unwrap();
        assert_eq!(output, "BACKEND!");
    }

    #[test]
    fn test_oversized_indent_is_an_error() {
        let engine = Engine::builder().validate(false).build();
        let err = engine
            .render_string("{{ \"x\" | indent 9223372036854775807 }}", &context(VALUES), "x")
            .unwrap_err();
        let EngineError::Template(e) = err else {
            panic!("expected template error, got {:?}", err);
        };
        assert_eq!(e.kind, TemplateErrorKind::FunctionError);
    }

    #[test]
    fn test_right_trim_needs_space() {
        let engine = Engine::builder().validate(false).build();
        let ctx = context("x: a");
        assert_eq!(
            engine.render_string("{{ .Values.x -}}\n  b", &ctx, "x").unwrap(),
            "ab"
        );
        assert!(engine.render_string("{{ .Values.x-}}\n  b", &ctx, "x").is_err());
    }

    #[test]
    fn test_template_name_in_context() {
        let engine = Engine::builder().validate(false).build();
        let output = engine
            .render_string("{{ .Template.Name }}", &context(VALUES), "deployment.yaml")
            .unwrap();
        assert_eq!(output, "deployment.yaml");
    }

    fn write_bundle(templates: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("values.yaml"), VALUES).unwrap();
        for (name, content) in templates {
            fs::write(dir.path().join("templates").join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_render_bundle() {
        let dir = write_bundle(&[
            ("deployment.yaml", DEPLOYMENT),
            ("empty.yaml", "{{/* nothing here */}}\n"),
        ]);
        let bundle = LoadedBundle::load(dir.path()).unwrap();
        let values = Values::from_file(&bundle.values_path).unwrap();
        let ctx = TemplateContext::new(values, ReleaseInfo::new("backend", "prod"));

        let result = Engine::new(true).render_bundle(&bundle, &ctx).unwrap();
        assert_eq!(result.manifests.keys().collect::<Vec<_>>(), vec!["deployment.yaml"]);
        assert!(result.validation.is_empty());
    }

    #[test]
    fn test_collect_errors_reports_every_template() {
        let dir = write_bundle(&[
            ("a.yaml", "name: {{ .Values.missing }}"),
            ("b.yaml", "name: {{ .Values.image.tag | nope }}"),
            ("c.yaml", DEPLOYMENT),
        ]);
        let bundle = LoadedBundle::load(dir.path()).unwrap();
        let result = Engine::new(true).render_bundle_collect_errors(&bundle, &context(VALUES));

        assert!(!result.is_success());
        assert_eq!(result.report.total_errors, 2);
        assert_eq!(result.report.summary(), "2 errors in 2 templates");
        assert_eq!(result.report.successful_templates, vec!["c.yaml"]);
        assert!(result.manifests.contains_key("c.yaml"));
    }
}
