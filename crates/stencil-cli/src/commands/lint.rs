//! Lint command - check a bundle and render every template

use console::{Term, style};
use std::path::Path;
use stencil_core::{LoadedBundle, ReleaseInfo, SchemaValidator, TemplateContext, Values};
use stencil_engine::Engine;

use crate::commands::{load_validator, merge_values};
use crate::display;
use crate::error::{CliError, Result};

pub fn run(path: &Path, strict: bool, skip_schema: bool) -> Result<()> {
    let out = Term::stdout();
    out.write_line(&format!(
        "{} Linting bundle at {}",
        style("→").blue(),
        path.display()
    ))?;

    let mut errors = 0;
    let mut warnings = 0;

    let bundle = match LoadedBundle::load(path) {
        Ok(b) => {
            out.write_line(&format!(
                "  {} Bundle is valid ({} v{})",
                style("✓").green(),
                b.bundle.metadata.name,
                b.bundle.metadata.version
            ))?;
            b
        }
        Err(e) => {
            out.write_line(&format!("  {} {}", style("✗").red(), e))?;
            return Err(CliError::lint_failed(1, 0));
        }
    };

    if bundle.values_path.exists() {
        match Values::from_file(&bundle.values_path) {
            Ok(_) => out.write_line(&format!("  {} values.yaml is valid", style("✓").green()))?,
            Err(e) => {
                out.write_line(&format!("  {} values.yaml: {}", style("✗").red(), e))?;
                errors += 1;
            }
        }
    } else {
        out.write_line(&format!(
            "  {} values.yaml not found (optional)",
            style("⚠").yellow()
        ))?;
        warnings += 1;
    }

    let mut validator: Option<SchemaValidator> = None;
    if skip_schema {
        out.write_line(&format!("  {} Schema validation skipped", style("→").blue()))?;
    } else if let Some(schema_path) = &bundle.schema_path {
        let name = schema_file_name(schema_path);
        match load_validator(&bundle) {
            Ok(v) => {
                out.write_line(&format!("  {} {} is valid", style("✓").green(), name))?;
                validator = v;
            }
            Err(e) => {
                out.write_line(&format!("  {} {}: {}", style("✗").red(), name, e))?;
                errors += 1;
            }
        }
    }

    match bundle.template_files() {
        Ok(files) if files.is_empty() => {
            out.write_line(&format!("  {} no templates found", style("⚠").yellow()))?;
            warnings += 1;
        }
        Ok(files) => out.write_line(&format!(
            "  {} found {} template(s)",
            style("✓").green(),
            files.len()
        ))?,
        Err(e) => {
            out.write_line(&format!("  {} templates: {}", style("✗").red(), e))?;
            errors += 1;
        }
    }

    let values = match merge_values(&bundle, validator.as_ref(), &[], &[]) {
        Ok(values) => values,
        Err(e) => {
            out.write_line(&format!("  {} {}", style("✗").red(), e))?;
            return Err(CliError::lint_failed(errors + 1, warnings));
        }
    };

    if let Some(validator) = &validator {
        let result = validator.validate(values.inner());
        if result.is_valid {
            out.write_line(&format!("  {} values match the schema", style("✓").green()))?;
        } else {
            let name = bundle
                .schema_path
                .as_deref()
                .map(schema_file_name)
                .unwrap_or_default();
            display::print_schema_errors(&out, &name, &result.errors)?;
            errors += result.errors.len();
        }
    }

    out.write_line("")?;
    out.write_line(&format!("{} Testing template rendering...", style("→").blue()))?;

    let context = TemplateContext::new(values, ReleaseInfo::new("release-name", "namespace"));
    let engine = Engine::builder()
        .config(&bundle.bundle.engine)
        .strict(strict || bundle.bundle.engine.strict)
        .validate(true)
        .build();

    let result = engine.render_bundle_collect_errors(&bundle, &context);

    if result.report.has_errors() {
        display::print_render_report(&out, &result.report)?;
        errors += result.report.total_errors;
    } else {
        out.write_line(&format!(
            "  {} Rendered {} template(s) successfully",
            style("✓").green(),
            result.report.successful_templates.len()
        ))?;
    }

    let (validation_errors, validation_warnings) = result.validation.summary();
    if result.validation.is_empty() {
        out.write_line(&format!(
            "  {} {} manifest(s) match the Kubernetes object schema",
            style("✓").green(),
            result.manifests.len()
        ))?;
    } else {
        display::print_validation_report(&out, &result.validation)?;
    }
    errors += validation_errors;
    warnings += validation_warnings;

    out.write_line("")?;
    if errors > 0 {
        out.write_line(&format!(
            "{} Linting failed with {} error(s) and {} warning(s)",
            style("✗").red().bold(),
            errors,
            warnings
        ))?;
        return Err(CliError::lint_failed(errors, warnings));
    } else if warnings > 0 {
        out.write_line(&format!(
            "{} Linting passed with {} warning(s)",
            style("⚠").yellow().bold(),
            warnings
        ))?;
    } else {
        out.write_line(&format!("{} Linting passed!", style("✓").green().bold()))?;
    }

    Ok(())
}

fn schema_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
