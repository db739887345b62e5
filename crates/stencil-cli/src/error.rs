//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use stencil_core::CoreError;
use stencil_engine::{EngineError, TemplateError};
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Validation failed (values schema or rendered manifests)
    #[error("Validation failed: {message}")]
    #[diagnostic(code(stencil::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A single template failed, rendered with its source snippet
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(TemplateError),

    /// Bundle structure or loading error
    #[error("Bundle error: {message}")]
    #[diagnostic(code(stencil::cli::bundle))]
    Bundle {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Linting failed with errors
    #[error("Linting failed with {errors} error(s) and {warnings} warning(s)")]
    #[diagnostic(code(stencil::cli::lint))]
    LintFailed { errors: usize, warnings: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(stencil::cli::io))]
    Io { message: String },

    /// Invalid command-line input
    #[error("{message}")]
    #[diagnostic(code(stencil::cli::input))]
    Input { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Template(_) => exit_codes::TEMPLATE_ERROR,
            CliError::Bundle { .. } => exit_codes::BUNDLE_ERROR,
            CliError::LintFailed { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Input { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a bundle error
    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
            help: None,
        }
    }

    /// Create a lint failure error
    pub fn lint_failed(errors: usize, warnings: usize) -> Self {
        Self::LintFailed { errors, warnings }
    }

    /// Create an input error (user provided invalid input)
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BundleNotFound { .. } => CliError::Bundle {
                message: err.to_string(),
                help: Some("Pass a bundle directory or a single template file".to_string()),
            },
            CoreError::InvalidBundle { .. } | CoreError::InvalidVersion(_) => {
                CliError::bundle(err.to_string())
            }
            CoreError::Io(e) => e.into(),
            CoreError::InvalidOverride { .. } => CliError::Validation {
                message: err.to_string(),
                help: Some("Use --set key=value, e.g. --set image.tag=v1.2.0".to_string()),
            },
            CoreError::InvalidSchema { .. } | CoreError::YamlParse(_) | CoreError::JsonParse(_) => {
                CliError::validation(err.to_string())
            }
        }
    }
}

impl From<TemplateError> for CliError {
    fn from(err: TemplateError) -> Self {
        CliError::Template(err)
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Template(e) => e.into(),
            EngineError::Validation { template, report } => {
                let (errors, warnings) = report.summary();
                CliError::validation_with_help(
                    format!(
                        "{} produced an invalid manifest: {} error(s), {} warning(s)",
                        template, errors, warnings
                    ),
                    "Fix the values or the template so the output is a valid Kubernetes object",
                )
            }
            EngineError::Core(e) => e.into(),
            EngineError::Io(e) => e.into(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::validation("x").exit_code(), exit_codes::VALIDATION_ERROR);
        assert_eq!(CliError::bundle("x").exit_code(), exit_codes::BUNDLE_ERROR);
        assert_eq!(CliError::lint_failed(1, 0).exit_code(), exit_codes::ERROR);
        assert_eq!(
            CliError::from(TemplateError::simple("boom")).exit_code(),
            exit_codes::TEMPLATE_ERROR
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let err: CliError = CoreError::BundleNotFound {
            path: "missing".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::BUNDLE_ERROR);

        let err: CliError = CoreError::Io(std::io::Error::other("denied")).into();
        assert_eq!(err.exit_code(), exit_codes::IO_ERROR);

        let err: CliError = CoreError::InvalidOverride {
            message: "bad".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::VALIDATION_ERROR);
    }

    #[test]
    fn test_lint_failed_message() {
        assert_eq!(
            CliError::lint_failed(2, 1).to_string(),
            "Linting failed with 2 error(s) and 1 warning(s)"
        );
    }
}
