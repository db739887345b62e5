//! Display formatting for CLI output
//!
//! Provides structured display for:
//! - Manifest validation issues grouped by template
//! - Values schema violations
//! - Render reports with suggestions

use console::{Term, style};
use std::io;
use stencil_core::ValidationErrorInfo;
use stencil_engine::RenderReport;
use stencil_kube::{Severity, ValidationIssue, ValidationReport};

/// Display manifest issues grouped by template, in the order they were found
pub fn print_validation_report(term: &Term, report: &ValidationReport) -> io::Result<()> {
    let mut groups: Vec<(&str, Vec<&ValidationIssue>)> = Vec::new();
    for issue in &report.issues {
        match groups.iter_mut().find(|(source, _)| *source == issue.source) {
            Some((_, issues)) => issues.push(issue),
            None => groups.push((issue.source.as_str(), vec![issue])),
        }
    }

    for (source, issues) in groups {
        term.write_line("")?;
        term.write_line(&style(source).cyan().bold().to_string())?;

        for issue in issues {
            let icon = match issue.severity {
                Severity::Error => style("✗").red(),
                Severity::Warning => style("⚠").yellow(),
            };

            let object = issue
                .object
                .as_ref()
                .map(|o| format!("{} ", style(o).bold()))
                .unwrap_or_default();

            let path_display = if issue.path.is_empty() {
                String::new()
            } else {
                format!(" at {}", style(&issue.path).dim())
            };

            term.write_line(&format!("  {} {}{}{}", icon, object, issue.message, path_display))?;
        }
    }

    Ok(())
}

/// Print the one-line outcome of a validation run
pub fn print_validation_summary(term: &Term, report: &ValidationReport) -> io::Result<()> {
    let (errors, warnings) = report.summary();
    let line = if errors > 0 {
        format!(
            "{} Validation failed: {} error(s), {} warning(s)",
            style("✗").red().bold(),
            errors,
            warnings
        )
    } else if warnings > 0 {
        format!(
            "{} Validation passed with {} warning(s)",
            style("⚠").yellow().bold(),
            warnings
        )
    } else {
        format!("{} Validation passed!", style("✓").green().bold())
    };
    term.write_line(&line)
}

/// Display values schema violations
pub fn print_schema_errors(term: &Term, schema: &str, errors: &[ValidationErrorInfo]) -> io::Result<()> {
    term.write_line("")?;
    term.write_line(&style(schema).cyan().bold().to_string())?;
    for error in errors {
        term.write_line(&format!(
            "  {} {} at {}",
            style("✗").red(),
            error.message,
            style(&error.path).dim()
        ))?;
    }
    Ok(())
}

/// Display a comprehensive render report with grouped errors
pub fn print_render_report(term: &Term, report: &RenderReport) -> io::Result<()> {
    term.write_line(&format!(
        "  {} Template rendering failed: {}",
        style("✗").red(),
        style(report.summary()).bold()
    ))?;
    term.write_line("")?;

    for (template_name, template_errors) in &report.errors_by_template {
        term.write_line(&format!(
            "  {} {} ({} {})",
            style("→").blue(),
            style(template_name).yellow(),
            template_errors.len(),
            if template_errors.len() == 1 {
                "error"
            } else {
                "errors"
            }
        ))?;

        for error in template_errors {
            let location = error
                .line()
                .map(|line| format!(" {}", style(format!("(line {})", line)).dim()))
                .unwrap_or_default();
            term.write_line(&format!("    {} {}{}", style("✗").red(), error.message, location))?;

            if let Some(suggestion) = &error.suggestion {
                term.write_line(&format!("      {} {}", style("hint:").blue(), suggestion))?;
            }
        }
        term.write_line("")?;
    }

    if !report.successful_templates.is_empty() {
        term.write_line(&format!(
            "  {} {} template(s) rendered successfully:",
            style("✓").green(),
            report.successful_templates.len()
        ))?;
        for name in &report.successful_templates {
            term.write_line(&format!("    - {}", name))?;
        }
    }

    Ok(())
}
