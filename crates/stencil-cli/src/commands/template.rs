//! Template command - render bundle templates locally

use clap::Args;
use console::{Term, style};
use std::fs;
use std::path::PathBuf;
use stencil_core::{LoadedBundle, ReleaseInfo, TemplateContext};
use stencil_engine::{Engine, EngineError};
use tracing::{debug, info};

use crate::commands::{load_validator, merge_values};
use crate::display;
use crate::error::{CliError, Result};

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Bundle directory or single template file
    pub path: PathBuf,

    /// Values file(s) to merge
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Set values on command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Release name (defaults to the bundle name)
    #[arg(long)]
    pub name: Option<String>,

    /// Target namespace
    #[arg(short, long, env = "STENCIL_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Output directory (if not set, outputs to stdout)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Show only templates whose name contains this text
    #[arg(short = 's', long)]
    pub show_only: Option<String>,

    /// Show merged values before the manifests
    #[arg(long)]
    pub show_values: bool,

    /// Skip values schema validation before rendering
    #[arg(long)]
    pub skip_schema: bool,

    /// Skip Kubernetes validation of the rendered manifests
    #[arg(long)]
    pub skip_validation: bool,

    /// Render undefined values as empty instead of failing (wins over --strict)
    #[arg(long)]
    pub lenient: bool,

    /// Override the bundle's strict setting
    #[arg(long, env = "STENCIL_STRICT", value_name = "BOOL")]
    pub strict: Option<bool>,
}

pub fn run(args: &TemplateArgs) -> Result<()> {
    let bundle = LoadedBundle::load(&args.path)?;
    info!(
        bundle = %bundle.bundle.metadata.name,
        version = %bundle.bundle.metadata.version,
        "rendering bundle"
    );

    let validator = if args.skip_schema {
        None
    } else {
        load_validator(&bundle)?
    };
    let values = merge_values(&bundle, validator.as_ref(), &args.values, &args.set)?;

    if let Some(validator) = &validator {
        let result = validator.validate(values.inner());
        if !result.is_valid {
            let schema = bundle
                .schema_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "schema".to_string());
            display::print_schema_errors(&Term::stderr(), &schema, &result.errors)?;
            return Err(CliError::validation_with_help(
                format!("values do not match {} ({} error(s))", schema, result.errors.len()),
                "Fix the values or pass --skip-schema to render anyway",
            ));
        }
        debug!("values match the schema");
    }

    let stdout = Term::stdout();
    if args.show_values {
        let yaml = serde_yaml::to_string(values.inner())
            .map_err(|e| CliError::validation(format!("Failed to serialize values: {}", e)))?;
        stdout.write_line(&style("# Computed Values").cyan().bold().to_string())?;
        stdout.write_line("---")?;
        stdout.write_line(yaml.trim_end())?;
        stdout.write_line("---")?;
        stdout.write_line("")?;
    }

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| bundle.bundle.metadata.name.clone());
    let context = TemplateContext::new(values, ReleaseInfo::new(&name, &args.namespace));

    let strict = if args.lenient {
        false
    } else {
        args.strict.unwrap_or(bundle.bundle.engine.strict)
    };
    let engine = Engine::builder()
        .config(&bundle.bundle.engine)
        .strict(strict)
        .validate(bundle.bundle.engine.validate && !args.skip_validation)
        .build();

    let result = match engine.render_bundle(&bundle, &context) {
        Ok(result) => result,
        Err(EngineError::Validation { template, report }) => {
            let stderr = Term::stderr();
            display::print_validation_report(&stderr, &report)?;
            stderr.write_line("")?;
            display::print_validation_summary(&stderr, &report)?;
            return Err(EngineError::Validation { template, report }.into());
        }
        Err(e) => return Err(e.into()),
    };

    if !result.validation.is_empty() {
        display::print_validation_report(&Term::stderr(), &result.validation)?;
    }

    let selected = result
        .manifests
        .iter()
        .filter(|(filename, _)| {
            args.show_only
                .as_deref()
                .is_none_or(|filter| filename.contains(filter))
        });

    if let Some(output_path) = &args.output_dir {
        fs::create_dir_all(output_path)?;

        for (filename, content) in selected {
            let file_path = output_path.join(filename);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file_path, content)?;
            stdout.write_line(&format!("{} {}", style("wrote").green(), file_path.display()))?;
        }
    } else {
        for (index, (filename, content)) in selected.enumerate() {
            if index > 0 {
                stdout.write_line("---")?;
            }
            stdout.write_line(&style(format!("# Source: {}", filename)).dim().to_string())?;
            stdout.write_line(content.trim_end())?;
        }
    }

    Ok(())
}
