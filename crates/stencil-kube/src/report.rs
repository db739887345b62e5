//! Validation findings for rendered manifests

use std::fmt;

use crate::manifest::ObjectRef;

/// Issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A single finding, located by source file, document and field path
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Template (or file) the document was rendered from
    pub source: String,
    /// 1-based document index within the source, 0 when not tied to one
    pub document: usize,
    pub object: Option<ObjectRef>,
    /// Dotted field path, e.g. `spec.template.spec.containers[0].image`
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if self.document > 0 {
            write!(f, " (document {})", self.document)?;
        }
        if let Some(object) = &self.object {
            write!(f, " {}", object)?;
        }
        if !self.path.is_empty() {
            write!(f, " at {}", self.path)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Collected findings across every validated document
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub validated_count: usize,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Append another report
    pub fn extend(&mut self, other: ValidationReport) {
        self.validated_count += other.validated_count;
        self.issues.extend(other.issues);
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// (errors, warnings)
    pub fn summary(&self) -> (usize, usize) {
        (self.errors().count(), self.warnings().count())
    }

    /// Check if there are any errors (not warnings)
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity) -> ValidationIssue {
        ValidationIssue {
            severity,
            source: "deployment.yaml".to_string(),
            document: 1,
            object: Some(ObjectRef {
                api_version: "apps/v1".to_string(),
                kind: "Deployment".to_string(),
                name: "backend".to_string(),
                namespace: None,
            }),
            path: "spec.replicas".to_string(),
            message: "must not be negative".to_string(),
        }
    }

    #[test]
    fn test_summary() {
        let mut report = ValidationReport::new();
        assert!(!report.has_errors());

        report.add_issue(issue(Severity::Warning));
        assert!(!report.has_errors());

        let mut other = ValidationReport::new();
        other.add_issue(issue(Severity::Error));
        other.validated_count = 2;
        report.extend(other);

        assert_eq!(report.summary(), (1, 1));
        assert!(report.has_errors());
        assert_eq!(report.validated_count, 2);
    }

    #[test]
    fn test_issue_display() {
        assert_eq!(
            issue(Severity::Error).to_string(),
            "deployment.yaml (document 1) Deployment/backend at spec.replicas: must not be negative"
        );
    }
}
