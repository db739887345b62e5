//! Kubernetes object schema and workload rules
//!
//! Each document goes through three passes:
//! 1. structural checks shared by every object (`apiVersion`, `kind`, names)
//! 2. typed deserialization for well-known kinds via `k8s-openapi`
//! 3. semantic rules for workloads that the typed schema cannot express

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret, Service};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use tracing::debug;

use crate::manifest::{Document, ObjectRef, json_type_name, split_documents};
use crate::quantity::Quantity;
use crate::report::{Severity, ValidationIssue, ValidationReport};

static DNS_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("label regex is valid")
});

static DNS_SUBDOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("subdomain regex is valid")
});

const MAX_LABEL_LEN: usize = 63;
const MAX_SUBDOMAIN_LEN: usize = 253;

const PULL_POLICIES: &[&str] = &["Always", "IfNotPresent", "Never"];

/// Validate a rendered manifest with the default validator
pub fn validate_manifests(source: &str, manifest: &str) -> ValidationReport {
    ManifestValidator::new().validate(source, manifest)
}

/// Validates rendered manifests against the Kubernetes object schema
#[derive(Debug, Clone)]
pub struct ManifestValidator {
    warn_on_floating_tags: bool,
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self {
            warn_on_floating_tags: true,
        }
    }
}

impl ManifestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle warnings for untagged and `latest` images
    pub fn warn_on_floating_tags(mut self, enabled: bool) -> Self {
        self.warn_on_floating_tags = enabled;
        self
    }

    /// Validate every document of a rendered manifest
    ///
    /// Never fails: YAML that does not parse becomes an error issue.
    pub fn validate(&self, source: &str, manifest: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        let documents = match split_documents(manifest) {
            Ok(documents) => documents,
            Err(e) => {
                report.add_issue(ValidationIssue {
                    severity: Severity::Error,
                    source: source.to_string(),
                    document: 0,
                    object: None,
                    path: String::new(),
                    message: e.to_string(),
                });
                return report;
            }
        };

        for document in &documents {
            for issue in self.validate_document(source, document) {
                report.add_issue(issue);
            }
            report.validated_count += 1;
        }

        debug!(
            source,
            documents = report.validated_count,
            issues = report.issues.len(),
            "validated manifest"
        );

        report
    }

    /// Validate one parsed document
    pub fn validate_document(&self, source: &str, document: &Document) -> Vec<ValidationIssue> {
        let mut checker = Checker {
            source,
            document: document.index,
            object: document.object_ref(),
            issues: Vec::new(),
        };
        let value = &document.value;

        if !checker.check_structure(value) {
            return checker.issues;
        }

        let api_version = value["apiVersion"].as_str().unwrap_or_default();
        let kind = value["kind"].as_str().unwrap_or_default();

        checker.check_typed(api_version, kind, value);

        if api_version == "apps/v1" && matches!(kind, "Deployment" | "StatefulSet" | "DaemonSet") {
            checker.check_workload(kind, value, self.warn_on_floating_tags);
        }

        checker.issues
    }
}

/// Accumulates issues for a single document
struct Checker<'a> {
    source: &'a str,
    document: usize,
    object: Option<ObjectRef>,
    issues: Vec<ValidationIssue>,
}

impl Checker<'_> {
    fn push(&mut self, severity: Severity, path: &str, message: String) {
        self.issues.push(ValidationIssue {
            severity,
            source: self.source.to_string(),
            document: self.document,
            object: self.object.clone(),
            path: path.to_string(),
            message,
        });
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.push(Severity::Error, path, message.into());
    }

    fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.push(Severity::Warning, path, message.into());
    }

    /// Returns false when the object is too malformed for further checks
    fn check_structure(&mut self, value: &JsonValue) -> bool {
        let mut ok = true;

        for field in ["apiVersion", "kind"] {
            match value.get(field) {
                Some(JsonValue::String(s)) if !s.trim().is_empty() => {}
                Some(JsonValue::String(_)) | None => {
                    self.error(field, format!("{} is required", field));
                    ok = false;
                }
                Some(other) => {
                    self.error(
                        field,
                        format!("{} must be a string, found {}", field, json_type_name(other)),
                    );
                    ok = false;
                }
            }
        }

        match value.pointer("/metadata/name") {
            Some(JsonValue::String(name)) => {
                if !is_dns_subdomain(name) {
                    self.error(
                        "metadata.name",
                        format!(
                            "'{}' is not a valid DNS-1123 subdomain (lowercase alphanumerics, '-' or '.', at most {} characters)",
                            name, MAX_SUBDOMAIN_LEN
                        ),
                    );
                }
            }
            Some(other) if !other.is_null() => {
                self.error(
                    "metadata.name",
                    format!("metadata.name must be a string, found {}", json_type_name(other)),
                );
                ok = false;
            }
            _ => {
                self.error("metadata.name", "metadata.name is required");
                ok = false;
            }
        }

        match value.pointer("/metadata/namespace") {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::String(ns)) => {
                if !is_dns_label(ns) {
                    self.error(
                        "metadata.namespace",
                        format!(
                            "'{}' is not a valid DNS-1123 label (lowercase alphanumerics or '-', at most {} characters)",
                            ns, MAX_LABEL_LEN
                        ),
                    );
                }
            }
            Some(other) => {
                self.error(
                    "metadata.namespace",
                    format!(
                        "metadata.namespace must be a string, found {}",
                        json_type_name(other)
                    ),
                );
            }
        }

        ok
    }

    fn check_typed(&mut self, api_version: &str, kind: &str, value: &JsonValue) {
        let result = match (api_version, kind) {
            ("apps/v1", "Deployment") => deserialize_as::<Deployment>(value),
            ("apps/v1", "StatefulSet") => deserialize_as::<StatefulSet>(value),
            ("apps/v1", "DaemonSet") => deserialize_as::<DaemonSet>(value),
            ("v1", "Service") => deserialize_as::<Service>(value),
            ("v1", "ConfigMap") => deserialize_as::<ConfigMap>(value),
            ("v1", "Secret") => deserialize_as::<Secret>(value),
            ("v1", "Pod") => deserialize_as::<Pod>(value),
            _ => {
                debug!(api_version, kind, "no typed schema, skipping");
                return;
            }
        };

        if let Err(message) = result {
            self.error("", format!("does not match the {} {} schema: {}", api_version, kind, message));
        }
    }

    fn check_workload(&mut self, kind: &str, value: &JsonValue, warn_on_floating_tags: bool) {
        if kind != "DaemonSet" {
            match value.pointer("/spec/replicas") {
                None | Some(JsonValue::Null) => {}
                Some(replicas) => match replicas.as_i64() {
                    Some(n) if n < 0 => {
                        self.error("spec.replicas", format!("replicas must not be negative, got {}", n));
                    }
                    Some(_) => {}
                    None => self.error(
                        "spec.replicas",
                        format!("replicas must be an integer, found {}", json_type_name(replicas)),
                    ),
                },
            }
        }

        self.check_selector(value);

        let pod_spec = value.pointer("/spec/template/spec");
        let containers = pod_spec
            .and_then(|s| s.get("containers"))
            .and_then(|c| c.as_array());

        match containers {
            Some(containers) if !containers.is_empty() => {
                self.check_containers("spec.template.spec.containers", containers, warn_on_floating_tags);
            }
            _ => self.error(
                "spec.template.spec.containers",
                "at least one container is required",
            ),
        }

        if let Some(init) = pod_spec
            .and_then(|s| s.get("initContainers"))
            .and_then(|c| c.as_array())
        {
            self.check_containers("spec.template.spec.initContainers", init, warn_on_floating_tags);
        }
    }

    fn check_selector(&mut self, value: &JsonValue) {
        let Some(match_labels) = value
            .pointer("/spec/selector/matchLabels")
            .and_then(|m| m.as_object())
        else {
            return;
        };

        let template_labels = value
            .pointer("/spec/template/metadata/labels")
            .and_then(|l| l.as_object());

        for (key, expected) in match_labels {
            let actual = template_labels.and_then(|labels| labels.get(key));
            if actual != Some(expected) {
                self.error(
                    &format!("spec.selector.matchLabels.{}", key),
                    format!(
                        "selector label {}={} does not match the pod template labels",
                        key,
                        display_scalar(expected)
                    ),
                );
            }
        }
    }

    fn check_containers(&mut self, base: &str, containers: &[JsonValue], warn_on_floating_tags: bool) {
        let mut seen = HashSet::new();

        for (i, container) in containers.iter().enumerate() {
            let path = format!("{}[{}]", base, i);

            match container.get("name").and_then(|n| n.as_str()) {
                Some(name) => {
                    if !is_dns_label(name) {
                        self.error(
                            &format!("{}.name", path),
                            format!("container name '{}' is not a valid DNS-1123 label", name),
                        );
                    }
                    if !seen.insert(name.to_string()) {
                        self.error(
                            &format!("{}.name", path),
                            format!("duplicate container name '{}'", name),
                        );
                    }
                }
                None => self.error(&format!("{}.name", path), "container name is required"),
            }

            match container.get("image").and_then(|i| i.as_str()) {
                Some(image) if !image.trim().is_empty() => {
                    if warn_on_floating_tags {
                        self.check_image_tag(&format!("{}.image", path), image);
                    }
                }
                _ => self.error(&format!("{}.image", path), "container image is required"),
            }

            if let Some(policy) = container.get("imagePullPolicy") {
                let valid = policy.as_str().is_some_and(|p| PULL_POLICIES.contains(&p));
                if !valid {
                    self.error(
                        &format!("{}.imagePullPolicy", path),
                        format!(
                            "imagePullPolicy {} is not one of {}",
                            display_scalar(policy),
                            PULL_POLICIES.join(", ")
                        ),
                    );
                }
            }

            if let Some(ports) = container.get("ports").and_then(|p| p.as_array()) {
                for (j, port) in ports.iter().enumerate() {
                    self.check_port(&format!("{}.ports[{}].containerPort", path, j), port.get("containerPort"));
                }
            }

            if let Some(env) = container.get("env").and_then(|e| e.as_array()) {
                for (j, var) in env.iter().enumerate() {
                    if let Some(selector) = var.pointer("/valueFrom/secretKeyRef") {
                        self.check_secret_ref(&format!("{}.env[{}].valueFrom.secretKeyRef", path, j), selector);
                    }
                }
            }

            if let Some(resources) = container.get("resources") {
                self.check_resources(&format!("{}.resources", path), resources);
            }
        }
    }

    fn check_image_tag(&mut self, path: &str, image: &str) {
        if image.contains('@') {
            return;
        }
        // A ':' before the last '/' belongs to a registry port
        let last_segment = image.rsplit('/').next().unwrap_or(image);
        match last_segment.split_once(':') {
            None => self.warning(
                path,
                format!("image '{}' has no tag and will resolve to 'latest'", image),
            ),
            Some((_, "latest")) => self.warning(
                path,
                format!("image '{}' uses the floating 'latest' tag", image),
            ),
            Some((_, "")) => self.error(path, format!("image '{}' has an empty tag", image)),
            Some(_) => {}
        }
    }

    fn check_port(&mut self, path: &str, port: Option<&JsonValue>) {
        match port {
            None => self.error(path, "containerPort is required"),
            Some(value) => match value.as_i64() {
                Some(n) if (1..=65535).contains(&n) => {}
                Some(n) => self.error(path, format!("port {} is outside 1-65535", n)),
                None => self.error(
                    path,
                    format!("port must be an integer, found {}", json_type_name(value)),
                ),
            },
        }
    }

    fn check_secret_ref(&mut self, path: &str, selector: &JsonValue) {
        for field in ["name", "key"] {
            let present = selector
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                self.error(
                    &format!("{}.{}", path, field),
                    format!("secretKeyRef requires a {}", field),
                );
            }
        }
    }

    fn check_resources(&mut self, path: &str, resources: &JsonValue) {
        let mut parsed: [Vec<(String, Quantity)>; 2] = [Vec::new(), Vec::new()];

        for (slot, section) in ["limits", "requests"].into_iter().enumerate() {
            let Some(entries) = resources.get(section).and_then(|s| s.as_object()) else {
                continue;
            };
            for (name, raw) in entries {
                match Quantity::from_json(raw) {
                    Some(q) => parsed[slot].push((name.clone(), q)),
                    None => self.error(
                        &format!("{}.{}.{}", path, section, name),
                        format!("{} is not a valid quantity", display_scalar(raw)),
                    ),
                }
            }
        }

        let [limits, requests] = parsed;
        for (name, request) in &requests {
            if let Some((_, limit)) = limits.iter().find(|(n, _)| n == name)
                && request.as_f64() > limit.as_f64()
            {
                self.error(
                    &format!("{}.requests.{}", path, name),
                    format!(
                        "{} request {} exceeds its limit {}",
                        name, request, limit
                    ),
                );
            }
        }
    }
}

/// Deserialize into a typed object after normalizing numeric quantities
fn deserialize_as<T: DeserializeOwned>(value: &JsonValue) -> Result<(), String> {
    let mut value = value.clone();
    normalize_quantities(&mut value);
    serde_json::from_value::<T>(value)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// `cpu: 1` is a valid quantity in YAML; the typed schema wants a string
fn normalize_quantities(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map.iter_mut() {
                if matches!(key.as_str(), "limits" | "requests")
                    && let JsonValue::Object(entries) = child
                {
                    for quantity in entries.values_mut() {
                        if let JsonValue::Number(n) = quantity {
                            *quantity = JsonValue::String(n.to_string());
                        }
                    }
                    continue;
                }
                normalize_quantities(child);
            }
        }
        JsonValue::Array(items) => items.iter_mut().for_each(normalize_quantities),
        _ => {}
    }
}

fn display_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// DNS-1123 label: lowercase alphanumerics and '-', at most 63 characters
pub fn is_dns_label(s: &str) -> bool {
    s.len() <= MAX_LABEL_LEN && DNS_LABEL_RE.is_match(s)
}

/// DNS-1123 subdomain: dot-separated labels, at most 253 characters
pub fn is_dns_subdomain(s: &str) -> bool {
    s.len() <= MAX_SUBDOMAIN_LEN && DNS_SUBDOMAIN_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKEND: &str = r#"
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
              cpu: 1
              memory: 512Mi
            requests:
              cpu: 250m
              memory: 128Mi
"#;

    fn messages(report: &ValidationReport) -> Vec<String> {
        report.issues.iter().map(|i| i.message.clone()).collect()
    }

    #[test]
    fn test_valid_deployment() {
        let report = validate_manifests("deployment.yaml", BACKEND);
        assert!(report.is_empty(), "unexpected issues: {:?}", messages(&report));
        assert_eq!(report.validated_count, 1);
    }

    #[test]
    fn test_negative_replicas() {
        let manifest = BACKEND.replace("replicas: 3", "replicas: -1");
        let report = validate_manifests("deployment.yaml", &manifest);
        let issue = report.errors().next().unwrap();
        assert_eq!(issue.path, "spec.replicas");
        assert_eq!(issue.document, 1);
        assert_eq!(issue.object.as_ref().unwrap().to_string(), "Deployment/backend");
    }

    #[test]
    fn test_replicas_must_be_integer() {
        let manifest = BACKEND.replace("replicas: 3", "replicas: three");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.errors().any(|i| i.path == "spec.replicas"));
        // typed schema rejects it as well
        assert!(report.errors().any(|i| i.message.contains("apps/v1 Deployment schema")));
    }

    #[test]
    fn test_invalid_pull_policy() {
        let manifest = BACKEND.replace("IfNotPresent", "Sometimes");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.has_errors());
        assert!(report.errors().any(|i| {
            i.path == "spec.template.spec.containers[0].imagePullPolicy"
                && i.message.contains("'Sometimes'")
        }));
    }

    #[test]
    fn test_empty_pull_policy_from_missing_value() {
        let manifest = BACKEND.replace("imagePullPolicy: IfNotPresent", "imagePullPolicy: ");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.errors().any(|i| i.path.ends_with("imagePullPolicy")));
    }

    #[test]
    fn test_missing_required_fields() {
        let report = validate_manifests("x.yaml", "kind: Deployment\nmetadata: {}\n");
        let paths: Vec<_> = report.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["apiVersion", "metadata.name"]);
    }

    #[test]
    fn test_invalid_names() {
        let manifest = BACKEND
            .replace("name: backend\n  namespace: prod", "name: Backend_1\n  namespace: prod.eu");
        let report = validate_manifests("deployment.yaml", &manifest);
        let paths: Vec<_> = report.errors().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"metadata.name"));
        assert!(paths.contains(&"metadata.namespace"));
    }

    #[test]
    fn test_name_length_limits() {
        assert!(is_dns_label(&"a".repeat(63)));
        assert!(!is_dns_label(&"a".repeat(64)));
        assert!(is_dns_subdomain("api.backend.prod"));
        assert!(!is_dns_subdomain(&format!("{}.x", "a".repeat(252))));
        assert!(!is_dns_label("-backend"));
    }

    #[test]
    fn test_selector_must_match_template_labels() {
        let manifest = BACKEND.replacen("      app: backend\n  template", "      app: frontend\n  template", 1);
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report
            .errors()
            .any(|i| i.path == "spec.selector.matchLabels.app"));
    }

    #[test]
    fn test_secret_ref_requires_key() {
        let manifest = BACKEND.replace("                  key: API-KEY\n", "");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.errors().any(|i| {
            i.path == "spec.template.spec.containers[0].env[0].valueFrom.secretKeyRef.key"
        }));
    }

    #[test]
    fn test_port_out_of_range() {
        let manifest = BACKEND.replace("containerPort: 5000", "containerPort: 70000");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.errors().any(|i| i.message.contains("outside 1-65535")));
    }

    #[test]
    fn test_request_exceeds_limit() {
        let manifest = BACKEND.replace("memory: 128Mi", "memory: 1Gi");
        let report = validate_manifests("deployment.yaml", &manifest);
        let issue = report.errors().next().unwrap();
        assert_eq!(issue.path, "spec.template.spec.containers[0].resources.requests.memory");
        assert!(issue.message.contains("exceeds its limit 512Mi"));
    }

    #[test]
    fn test_invalid_quantity() {
        let manifest = BACKEND.replace("cpu: 250m", "cpu: quarter");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.errors().any(|i| i.message.contains("not a valid quantity")));
    }

    #[test]
    fn test_containers_required_and_unique() {
        let empty = r#"
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: agent
spec:
  selector:
    matchLabels:
      app: agent
  template:
    metadata:
      labels:
        app: agent
    spec:
      containers: []
"#;
        let report = validate_manifests("daemonset.yaml", empty);
        assert!(report
            .errors()
            .any(|i| i.message == "at least one container is required"));

        let duplicate = BACKEND.replace(
            "          resources:",
            "        - name: backend\n          image: sidecar:1.0\n          resources:",
        );
        let report = validate_manifests("deployment.yaml", &duplicate);
        assert!(report
            .errors()
            .any(|i| i.message == "duplicate container name 'backend'"));
    }

    #[test]
    fn test_floating_tag_warnings() {
        let latest = BACKEND.replace("registry/backend:v1.2.0", "registry/backend:latest");
        let report = validate_manifests("deployment.yaml", &latest);
        assert!(!report.has_errors());
        assert_eq!(report.summary(), (0, 1));

        let untagged = BACKEND.replace("registry/backend:v1.2.0", "registry:5000/backend");
        let report = validate_manifests("deployment.yaml", &untagged);
        assert_eq!(report.summary(), (0, 1));
        assert!(report.warnings().next().unwrap().message.contains("no tag"));

        let quiet = ManifestValidator::new()
            .warn_on_floating_tags(false)
            .validate("deployment.yaml", &latest);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_empty_image_is_error() {
        let manifest = BACKEND.replace("\"registry/backend:v1.2.0\"", "\"\"");
        let report = validate_manifests("deployment.yaml", &manifest);
        assert!(report.errors().any(|i| i.message == "container image is required"));
    }

    #[test]
    fn test_typed_schema_for_core_kinds() {
        let configmap = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\ndata:\n  port: \"8080\"\n";
        assert!(validate_manifests("cm.yaml", configmap).is_empty());

        let bad = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  ports: oops\n";
        let report = validate_manifests("svc.yaml", bad);
        assert!(report.errors().any(|i| i.message.contains("v1 Service schema")));
    }

    #[test]
    fn test_unknown_kind_only_structural() {
        let manifest = "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\nspec:\n  anything: [1, 2]\n";
        assert!(validate_manifests("widget.yaml", manifest).is_empty());
    }

    #[test]
    fn test_yaml_error_becomes_issue() {
        let report = validate_manifests("broken.yaml", "kind: [oops\n");
        assert!(report.has_errors());
        assert_eq!(report.validated_count, 0);
    }

    #[test]
    fn test_multiple_documents_counted() {
        let manifest = format!("{}\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n", BACKEND);
        let report = validate_manifests("all.yaml", &manifest);
        assert_eq!(report.validated_count, 2);
        assert!(report.is_empty());
    }
}
