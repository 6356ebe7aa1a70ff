//! Environment normalization helpers.

use std::env;

/// Environment variable that marks a CI run.
pub const CI_VAR: &str = "CI";
/// Environment variable holding the xtask log filter.
pub const LOG_FILTER_VAR: &str = "XTASK_LOG";

/// Shared environment helper utilities.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvHelper;

impl EnvHelper {
    /// Interpret a raw `CI` value: set and non-empty means a CI run.
    pub fn is_ci_value(raw: Option<&str>) -> bool {
        matches!(raw, Some(value) if !value.trim().is_empty())
    }

    /// Return whether the current process runs under CI.
    pub fn is_ci(&self) -> bool {
        Self::is_ci_value(env::var(CI_VAR).ok().as_deref())
    }

    /// Return the configured log filter, if any.
    pub fn log_filter(&self) -> Option<String> {
        env::var(LOG_FILTER_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}
