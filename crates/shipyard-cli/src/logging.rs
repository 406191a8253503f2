//! Log setup
//!
//! Verbosity and the warning policy travel together as one [`LogConfig`]
//! value built from the global flags.

use shipyard_core::WarningPolicy;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub verbose: bool,
    pub policy: WarningPolicy,
}

impl LogConfig {
    pub fn from_flags(verbose: bool, suppress_warnings: bool, error_on_warning: bool) -> Self {
        let policy = if error_on_warning {
            WarningPolicy::Escalate
        } else if suppress_warnings {
            WarningPolicy::Suppress
        } else {
            WarningPolicy::Report
        };
        Self { verbose, policy }
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.policy == WarningPolicy::Suppress {
            "error"
        } else {
            "warn"
        }
    }

    /// Install the global subscriber, writing to stderr
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive()));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(
            LogConfig::from_flags(false, false, false).policy,
            WarningPolicy::Report
        );
        assert_eq!(
            LogConfig::from_flags(false, true, false).policy,
            WarningPolicy::Suppress
        );
        // Escalation wins over suppression
        assert_eq!(
            LogConfig::from_flags(false, true, true).policy,
            WarningPolicy::Escalate
        );
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(LogConfig::from_flags(false, false, false).default_directive(), "warn");
        assert_eq!(LogConfig::from_flags(false, true, false).default_directive(), "error");
        assert_eq!(LogConfig::from_flags(true, true, false).default_directive(), "debug");
        assert_eq!(LogConfig::from_flags(false, false, true).default_directive(), "warn");
    }
}
