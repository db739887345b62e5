//! Error types for stencil-kube

use thiserror::Error;

/// Result type for stencil-kube operations
pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors raised while splitting rendered output into objects
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// A document is not valid YAML
    #[error("document {document}: invalid YAML: {source}")]
    Yaml {
        document: usize,
        #[source]
        source: serde_yaml::Error,
    },

    /// A document parsed, but is not a mapping
    #[error("document {document}: expected a mapping, found {found}")]
    NotAMapping { document: usize, found: &'static str },
}
