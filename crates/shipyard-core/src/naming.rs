//! Platform identifier normalization
//!
//! Object names must be valid DNS-1123 labels: lowercase alphanumerics and
//! `-`, starting and ending with an alphanumeric, at most 63 characters.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Maximum length of an object name
pub const MAX_NAME_LENGTH: usize = 63;

/// Label shared by a controller, its pods and its service
pub const SELECTOR_LABEL: &str = "io.shipyard.service";

/// Normalize a service name into a valid object name
///
/// Lowercases, replaces every character outside `[a-z0-9]` with `-`,
/// collapses runs of `-`, trims leading/trailing `-` and truncates to
/// [`MAX_NAME_LENGTH`].
pub fn to_dns_label(name: &str) -> Result<String> {
    let mut label = String::with_capacity(name.len());
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            label.push(c);
        } else if !label.is_empty() && !label.ends_with('-') {
            label.push('-');
        }
    }

    label.truncate(MAX_NAME_LENGTH);
    let label = label.trim_end_matches('-').to_string();

    if label.is_empty() {
        return Err(CoreError::validation(format!(
            "'{}' cannot be turned into a valid object name",
            name
        )));
    }
    Ok(label)
}

/// Selector labels for an already normalized object name
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(SELECTOR_LABEL.to_string(), name.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name_unchanged() {
        assert_eq!(to_dns_label("web").unwrap(), "web");
        assert_eq!(to_dns_label("my-app-2").unwrap(), "my-app-2");
    }

    #[test]
    fn test_lowercase_and_replace() {
        assert_eq!(to_dns_label("My_Service").unwrap(), "my-service");
        assert_eq!(to_dns_label("api.v2").unwrap(), "api-v2");
    }

    #[test]
    fn test_collapse_and_trim() {
        assert_eq!(to_dns_label("__web__db__").unwrap(), "web-db");
        assert_eq!(to_dns_label("-a--b-").unwrap(), "a-b");
    }

    #[test]
    fn test_truncate() {
        let long = "a".repeat(100);
        assert_eq!(to_dns_label(&long).unwrap().len(), MAX_NAME_LENGTH);

        // Truncation must not leave a trailing dash
        let dashed = format!("{}_tail", "b".repeat(62));
        let label = to_dns_label(&dashed).unwrap();
        assert_eq!(label, "b".repeat(62));
    }

    #[test]
    fn test_empty_result_is_error() {
        assert!(matches!(
            to_dns_label("___"),
            Err(CoreError::Validation { .. })
        ));
        assert!(to_dns_label("").is_err());
    }

    #[test]
    fn test_selector_labels() {
        let labels = selector_labels("web");
        assert_eq!(labels.get(SELECTOR_LABEL).map(String::as_str), Some("web"));
        assert_eq!(labels.len(), 1);
    }
}
