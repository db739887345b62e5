//! Validate command - validate values against the bundle schema

use clap::Args;
use console::{Term, style};
use std::path::PathBuf;
use stencil_core::{LoadedBundle, Schema, SchemaValidator};

use crate::commands::merge_values;
use crate::display;
use crate::error::{CliError, Result};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Bundle path
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// External schema file to use (overrides the bundle schema)
    #[arg(short = 's', long)]
    pub schema: Option<PathBuf>,

    /// Values file(s) to merge over values.yaml
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Set values on command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Output validation results as JSON
    #[arg(long)]
    pub json: bool,

    /// Fail when the bundle has no schema
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: &ValidateArgs, verbose: bool) -> Result<()> {
    let bundle = LoadedBundle::load(&args.path)?;
    let out = Term::stdout();
    let human = !args.json;

    if human {
        out.write_line(&format!(
            "{} Validating values for {} v{}",
            style("→").blue(),
            bundle.bundle.metadata.name,
            bundle.bundle.metadata.version
        ))?;
    }

    let schema_path = args.schema.clone().or_else(|| bundle.schema_path.clone());
    let Some(schema_path) = schema_path else {
        if args.strict {
            return Err(CliError::validation_with_help(
                "no values schema found",
                "Add values.schema.yaml to the bundle or pass --schema",
            ));
        }
        if human {
            out.write_line(&format!(
                "  {} No schema found (values.schema.yaml or values.schema.json)",
                style("⚠").yellow()
            ))?;
        }
        return Ok(());
    };

    let validator = SchemaValidator::new(Schema::from_file(&schema_path)?)?;
    if human {
        out.write_line(&format!(
            "  {} Loaded schema from {}",
            style("✓").green(),
            schema_path.display()
        ))?;
    }

    let values = merge_values(&bundle, Some(&validator), &args.values, &args.set)?;
    if verbose && human {
        out.write_line(&format!(
            "  {} Merged schema defaults, values.yaml, {} values file(s) and {} --set override(s)",
            style("→").blue(),
            args.values.len(),
            args.set.len()
        ))?;
    }

    let result = validator.validate(values.inner());

    if args.json {
        let output = serde_json::json!({
            "valid": result.is_valid,
            "bundle": {
                "name": bundle.bundle.metadata.name,
                "version": bundle.bundle.metadata.version.to_string(),
            },
            "schema": schema_path.display().to_string(),
            "errors": result.errors.iter().map(|e| {
                serde_json::json!({
                    "path": e.path,
                    "message": e.message,
                })
            }).collect::<Vec<_>>(),
        });
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::validation(format!("Failed to serialize result: {}", e)))?;
        out.write_line(&text)?;
    } else if result.is_valid {
        out.write_line(&format!("  {} Values are valid against schema", style("✓").green()))?;
        out.write_line("")?;
        out.write_line(&format!("{} Validation passed!", style("✓").green().bold()))?;
    } else {
        display::print_schema_errors(&out, &schema_path.display().to_string(), &result.errors)?;
        out.write_line("")?;
        out.write_line(&format!(
            "{} Validation failed: {} error(s)",
            style("✗").red().bold(),
            result.errors.len()
        ))?;
    }

    if result.is_valid {
        Ok(())
    } else {
        Err(CliError::validation(format!(
            "{} value(s) do not match the schema",
            result.errors.len()
        )))
    }
}
