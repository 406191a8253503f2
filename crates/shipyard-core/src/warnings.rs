//! Conversion warnings
//!
//! Loaders and transformers drop what they cannot map and report it here.
//! The [`WarningPolicy`] is an explicit value consulted at every warning
//! site, so escalating warnings to errors needs no global logger hook.

use std::fmt;

use crate::error::{CoreError, Result};

/// How warnings are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningPolicy {
    /// Log and collect
    #[default]
    Report,
    /// Collect only, log at debug level
    Suppress,
    /// Fail on the first warning
    Escalate,
}

/// A field that could not be mapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionWarning {
    /// Service the warning belongs to, if any
    pub service: Option<String>,
    /// Field or key that triggered the warning
    pub field: String,
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ConversionWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: None,
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn for_service(
        service: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: Some(service.into()),
            ..Self::new(field, message)
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(f, "service '{}': {}: {}", service, self.field, self.message)?,
            None => write!(f, "{}: {}", self.field, self.message)?,
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Warning sink threaded through a conversion
#[derive(Debug, Default)]
pub struct Warnings {
    policy: WarningPolicy,
    collected: Vec<ConversionWarning>,
}

impl Warnings {
    pub fn new(policy: WarningPolicy) -> Self {
        Self {
            policy,
            collected: Vec::new(),
        }
    }

    pub fn policy(&self) -> WarningPolicy {
        self.policy
    }

    /// Record a warning
    ///
    /// Returns `CoreError::WarningEscalated` under [`WarningPolicy::Escalate`].
    pub fn warn(&mut self, warning: ConversionWarning) -> Result<()> {
        match self.policy {
            WarningPolicy::Escalate => {
                return Err(CoreError::WarningEscalated {
                    message: warning.to_string(),
                });
            }
            WarningPolicy::Report => tracing::warn!("{}", warning),
            WarningPolicy::Suppress => tracing::debug!("{}", warning),
        }
        self.collected.push(warning);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversionWarning> {
        self.collected.iter()
    }

    pub fn len(&self) -> usize {
        self.collected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collected.is_empty()
    }

    pub fn into_vec(self) -> Vec<ConversionWarning> {
        self.collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_collects() {
        let mut warnings = Warnings::new(WarningPolicy::Report);
        warnings
            .warn(ConversionWarning::for_service("web", "build", "not supported"))
            .unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings.iter().next().unwrap().to_string(),
            "service 'web': build: not supported"
        );
    }

    #[test]
    fn test_suppress_still_collects() {
        let mut warnings = Warnings::new(WarningPolicy::Suppress);
        warnings.warn(ConversionWarning::new("x-ext", "ignored")).unwrap();
        assert_eq!(warnings.into_vec().len(), 1);
    }

    #[test]
    fn test_escalate_fails() {
        let mut warnings = Warnings::new(WarningPolicy::Escalate);
        let err = warnings
            .warn(ConversionWarning::new("dns", "not supported"))
            .unwrap_err();

        assert!(matches!(err, CoreError::WarningEscalated { .. }));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_display_with_suggestion() {
        let warning = ConversionWarning::for_service("web", "imgae", "unknown key")
            .with_suggestion("did you mean 'image'?");
        assert_eq!(
            warning.to_string(),
            "service 'web': imgae: unknown key (did you mean 'image'?)"
        );
    }
}
