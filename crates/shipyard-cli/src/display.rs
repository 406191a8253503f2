//! Display formatting for CLI output
//!
//! Everything here goes to stderr; stdout is reserved for rendered objects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use console::style;
use shipyard_core::{ConversionWarning, WarningPolicy, Warnings};
use shipyard_kube::OperationSummary;

/// Key used for warnings not tied to a service
const GLOBAL_GROUP: &str = "(file)";

/// Group warnings by service, file-level warnings first
pub fn group_warnings(warnings: &Warnings) -> BTreeMap<&str, Vec<&ConversionWarning>> {
    let mut groups: BTreeMap<&str, Vec<&ConversionWarning>> = BTreeMap::new();
    for warning in warnings.iter() {
        let key = warning.service.as_deref().unwrap_or(GLOBAL_GROUP);
        groups.entry(key).or_default().push(warning);
    }
    groups
}

/// Print the collected warnings, grouped by service
pub fn print_warnings(warnings: &Warnings) {
    if warnings.is_empty() || warnings.policy() != WarningPolicy::Report {
        return;
    }

    eprintln!();
    eprintln!(
        "  {} {}",
        style("Warnings").bold().yellow(),
        style(format!("({})", warnings.len())).dim()
    );
    for (service, items) in group_warnings(warnings) {
        eprintln!("  {}", style(service).cyan());
        for warning in items {
            eprintln!(
                "    {} {}: {}",
                style("⚠").yellow(),
                style(&warning.field).bold(),
                warning.message
            );
            if let Some(suggestion) = &warning.suggestion {
                eprintln!("      {} {}", style("→").dim(), suggestion);
            }
        }
    }
    eprintln!();
}

/// Print the files a conversion wrote
pub fn print_written(files: &[PathBuf]) {
    for file in files {
        eprintln!("{} Wrote {}", style("✓").green().bold(), file.display());
    }
}

pub fn print_chart(root: &Path) {
    eprintln!(
        "{} Chart created in {}",
        style("✓").green().bold(),
        style(root.display()).cyan()
    );
}

/// Print per-object results and the totals of a cluster operation
pub fn print_summary(summary: &OperationSummary) {
    for name in &summary.succeeded {
        eprintln!("{} {}", style("✓").green().bold(), name);
    }
    for (name, reason) in &summary.skipped {
        eprintln!("{} {} ({})", style("○").yellow(), name, reason);
    }
    for (name, error) in &summary.failed {
        eprintln!("{} {}: {}", style("✗").red().bold(), name, error);
    }

    let totals = summary.summary();
    if summary.is_success() {
        eprintln!("{}", style(totals).green());
    } else {
        eprintln!("{}", style(totals).red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_warnings() {
        let mut warnings = Warnings::new(WarningPolicy::Suppress);
        warnings
            .warn(ConversionWarning::for_service("web", "build", "not supported"))
            .unwrap();
        warnings
            .warn(ConversionWarning::new("x-custom", "ignored"))
            .unwrap();
        warnings
            .warn(ConversionWarning::for_service("web", "dns", "not supported"))
            .unwrap();
        warnings
            .warn(ConversionWarning::for_service("db", "logging", "not supported"))
            .unwrap();

        let groups = group_warnings(&warnings);
        let keys: Vec<&str> = groups.keys().copied().collect();
        assert_eq!(keys, vec!["(file)", "db", "web"]);
        assert_eq!(groups["web"].len(), 2);
        assert_eq!(groups["web"][1].field, "dns");
    }
}
