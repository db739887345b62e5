//! Create command - scaffold a deployment bundle

use console::{Term, style};
use std::fs;
use std::path::Path;
use stencil_kube::validate::is_dns_label;

use crate::error::{CliError, Result};

const NAME: &str = "%NAME%";

const BUNDLE_YAML: &str = r#"metadata:
  name: %NAME%
  version: 0.1.0
  description: Deployment manifest for %NAME%

engine:
  strict: true
  validate: true
"#;

const VALUES_YAML: &str = r#"# Default values for %NAME%

namespace:
  name: default

replicaCount: 1

image:
  repository: registry/%NAME%
  tag: "0.1.0"
  pullPolicy: IfNotPresent

resources:
  limits:
    cpu: 500m
    memory: 256Mi
  requests:
    cpu: 250m
    memory: 128Mi
"#;

const SCHEMA_YAML: &str = r#"schemaVersion: stencil/v1
title: %NAME% deployment
properties:
  namespace:
    type: object
    properties:
      name:
        type: string
        required: true
        pattern: "^[a-z0-9]([-a-z0-9]*[a-z0-9])?$"
  replicaCount:
    type: integer
    default: 1
    min: 0
  image:
    type: object
    properties:
      repository:
        type: string
        required: true
      tag:
        type: string
        required: true
      pullPolicy:
        type: string
        default: IfNotPresent
        enum: [Always, IfNotPresent, Never]
  resources:
    type: object
"#;

const DEPLOYMENT_YAML: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: %NAME%
  namespace: {{ .Values.namespace.name }}
  labels:
    app: %NAME%
spec:
  replicas: {{ .Values.replicaCount }}
  selector:
    matchLabels:
      app: %NAME%
  template:
    metadata:
      labels:
        app: %NAME%
    spec:
      containers:
        - name: %NAME%
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

pub fn run(name: &str, output: &Path) -> Result<()> {
    if !is_dns_label(name) {
        return Err(CliError::input(format!(
            "'{}' is not a valid bundle name: use lowercase letters, digits and '-' (at most 63 characters)",
            name
        )));
    }

    let bundle_dir = output.join(name);
    if bundle_dir.exists() {
        return Err(CliError::input(format!(
            "Directory {} already exists",
            bundle_dir.display()
        )));
    }

    fs::create_dir_all(bundle_dir.join("templates"))?;

    let files = [
        ("Stencil.yaml", BUNDLE_YAML),
        ("values.yaml", VALUES_YAML),
        ("values.schema.yaml", SCHEMA_YAML),
        ("templates/deployment.yaml", DEPLOYMENT_YAML),
    ];
    for (file, content) in files {
        fs::write(bundle_dir.join(file), content.replace(NAME, name))?;
    }

    let out = Term::stdout();
    out.write_line(&format!(
        "{} Created bundle {} at {}",
        style("✓").green().bold(),
        style(name).cyan(),
        style(bundle_dir.display()).dim()
    ))?;
    out.write_line("")?;
    out.write_line("Next steps:")?;
    out.write_line(&format!(
        "  1. Edit {} to customize your deployment",
        style("values.yaml").cyan()
    ))?;
    out.write_line(&format!("  2. Edit templates in {}", style("templates/").cyan()))?;
    out.write_line(&format!(
        "  3. Test with: {} template {}",
        style("stencil").green(),
        bundle_dir.display()
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::{LoadedBundle, ReleaseInfo, SchemaValidator, TemplateContext, Values};
    use stencil_engine::Engine;
    use tempfile::TempDir;

    #[test]
    fn test_scaffold_renders_valid_deployment() {
        let dir = TempDir::new().unwrap();
        run("backend", dir.path()).unwrap();

        let bundle = LoadedBundle::load(dir.path().join("backend")).unwrap();
        assert_eq!(bundle.bundle.metadata.name, "backend");

        let validator = SchemaValidator::new(bundle.load_schema().unwrap().unwrap()).unwrap();
        let values = Values::from_file(&bundle.values_path).unwrap();
        assert!(validator.validate(values.inner()).is_valid);

        let context = TemplateContext::new(values, ReleaseInfo::new("backend", "default"));
        let result = Engine::new(true).render_bundle(&bundle, &context).unwrap();
        let manifest = &result.manifests["deployment.yaml"];
        assert!(manifest.contains("image: \"registry/backend:0.1.0\""));
        assert!(result.validation.is_empty());
    }

    #[test]
    fn test_rejects_invalid_name() {
        let dir = TempDir::new().unwrap();
        assert!(run("My_App", dir.path()).is_err());
    }

    #[test]
    fn test_refuses_existing_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        assert!(run("backend", dir.path()).is_err());
    }
}
