//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure, including failed lints
pub const ERROR: i32 = 1;

/// Validation error - values schema or rendered manifest validation failed
pub const VALIDATION_ERROR: i32 = 2;

/// Template error - template parsing or evaluation failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Bundle error - missing bundle, invalid Stencil.yaml or templates/ layout
pub const BUNDLE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
