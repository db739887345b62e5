//! Stencil Kube - Kubernetes object validation for rendered manifests
//!
//! This crate checks rendered template output before it leaves the engine:
//! - **Manifest splitting**: multi-document YAML into individual objects
//! - **Object schema**: `apiVersion`/`kind`/`metadata` rules and typed
//!   deserialization of well-known kinds through `k8s-openapi`
//! - **Workload rules**: replicas, containers, images, pull policies, ports,
//!   secret references, selectors and resource quantities

pub mod error;
pub mod manifest;
pub mod quantity;
pub mod report;
pub mod validate;

pub use error::{ManifestError, Result};
pub use manifest::{Document, ObjectRef, split_documents};
pub use quantity::Quantity;
pub use report::{Severity, ValidationIssue, ValidationReport};
pub use validate::{ManifestValidator, validate_manifests};
