//! CLI commands

pub mod create;
pub mod lint;
pub mod template;
pub mod validate;

use std::path::PathBuf;
use stencil_core::{LoadedBundle, SchemaValidator, Values, parse_set_values};
use tracing::debug;

use crate::error::Result;

/// Merge values in precedence order: schema defaults < `values.yaml` < `-f` files < `--set`
pub fn merge_values(
    bundle: &LoadedBundle,
    validator: Option<&SchemaValidator>,
    values_files: &[PathBuf],
    set_values: &[String],
) -> Result<Values> {
    let base = if bundle.values_path.exists() {
        debug!(path = %bundle.values_path.display(), "loaded default values");
        Values::from_file(&bundle.values_path)?
    } else {
        Values::new()
    };

    let mut values = match validator {
        Some(validator) => {
            debug!("applied schema defaults");
            Values::with_schema_defaults(validator.defaults_as_values(), base)
        }
        None => base,
    };

    for values_file in values_files {
        values.merge(&Values::from_file(values_file)?);
        debug!(path = %values_file.display(), "merged values file");
    }

    if !set_values.is_empty() {
        values.merge(&parse_set_values(set_values)?);
        debug!(count = set_values.len(), "applied --set overrides");
    }

    Ok(values)
}

/// Compile the bundle's values schema, if it has one
pub fn load_validator(bundle: &LoadedBundle) -> Result<Option<SchemaValidator>> {
    match bundle.load_schema()? {
        Some(schema) => Ok(Some(SchemaValidator::new(schema)?)),
        None => Ok(None),
    }
}
