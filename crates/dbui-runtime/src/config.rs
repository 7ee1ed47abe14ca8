#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `DBUI_MAX_PASS_BATCH` | `max_pass_batch` | 256 |
//! | `DBUI_LOAD_TIMEOUT_MS` | `load_timeout` | 2000 ms |
//! | `DBUI_CATCH_PANICS` | `catch_panics` | true |
//! | `DBUI_TRACE_PASSES` | `trace_passes` | false |
//!
//! Invalid values keep the default and are reported by
//! [`RuntimeConfig::from_env_with_diagnostics`].

use std::fmt;
use std::time::Duration;

pub const ENV_MAX_PASS_BATCH: &str = "DBUI_MAX_PASS_BATCH";
pub const ENV_LOAD_TIMEOUT_MS: &str = "DBUI_LOAD_TIMEOUT_MS";
pub const ENV_CATCH_PANICS: &str = "DBUI_CATCH_PANICS";
pub const ENV_TRACE_PASSES: &str = "DBUI_TRACE_PASSES";

/// Runtime tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Representations reconciled per UI callback. Remaining ones are
    /// re-posted so one callback never monopolizes the UI thread.
    pub max_pass_batch: usize,
    /// How long to wait for a background load before proceeding without it.
    pub load_timeout: Duration,
    /// Capture panics in adapter code and treat them like errors.
    pub catch_panics: bool,
    /// Log every pass at `trace` level.
    pub trace_passes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_pass_batch: 256,
            load_timeout: Duration::from_millis(2000),
            catch_panics: true,
            trace_passes: false,
        }
    }
}

/// A rejected environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} (expected {})", self.variable, self.value, self.expected)
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    #[must_use]
    pub fn with_max_pass_batch(mut self, batch: usize) -> Self {
        self.max_pass_batch = batch.max(1);
        self
    }

    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    #[must_use]
    pub fn with_trace_passes(mut self, trace: bool) -> Self {
        self.trace_passes = trace;
        self
    }

    /// Read the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let (config, errors) = Self::from_env_with_diagnostics();
        for e in &errors {
            tracing::warn!(error = %e, "ignoring invalid runtime setting");
        }
        config
    }

    #[must_use]
    pub fn from_env_with_diagnostics() -> (Self, Vec<ConfigError>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(mut get: F) -> (Self, Vec<ConfigError>)
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_MAX_PASS_BATCH) {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_pass_batch = n,
                _ => errors.push(ConfigError {
                    variable: ENV_MAX_PASS_BATCH,
                    value,
                    expected: "positive integer",
                }),
            }
        }
        if let Some(value) = get(ENV_LOAD_TIMEOUT_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.load_timeout = Duration::from_millis(ms),
                Err(_) => errors.push(ConfigError {
                    variable: ENV_LOAD_TIMEOUT_MS,
                    value,
                    expected: "milliseconds",
                }),
            }
        }
        if let Some(value) = get(ENV_CATCH_PANICS) {
            match parse_bool(&value) {
                Some(b) => config.catch_panics = b,
                None => errors.push(ConfigError {
                    variable: ENV_CATCH_PANICS,
                    value,
                    expected: "bool (1/0/true/false)",
                }),
            }
        }
        if let Some(value) = get(ENV_TRACE_PASSES) {
            match parse_bool(&value) {
                Some(b) => config.trace_passes = b,
                None => errors.push(ConfigError {
                    variable: ENV_TRACE_PASSES,
                    value,
                    expected: "bool (1/0/true/false)",
                }),
            }
        }
        (config, errors)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let (config, errors) = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(config, RuntimeConfig::default());
        assert!(errors.is_empty());
    }

    #[test]
    fn parses_all_fields() {
        let (config, errors) = RuntimeConfig::from_lookup(lookup(&[
            (ENV_MAX_PASS_BATCH, "8"),
            (ENV_LOAD_TIMEOUT_MS, "150"),
            (ENV_CATCH_PANICS, "off"),
            (ENV_TRACE_PASSES, "1"),
        ]));
        assert!(errors.is_empty());
        assert_eq!(config.max_pass_batch, 8);
        assert_eq!(config.load_timeout, Duration::from_millis(150));
        assert!(!config.catch_panics);
        assert!(config.trace_passes);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let (config, errors) = RuntimeConfig::from_lookup(lookup(&[
            (ENV_MAX_PASS_BATCH, "0"),
            (ENV_CATCH_PANICS, "maybe"),
        ]));
        assert_eq!(config.max_pass_batch, 256);
        assert!(config.catch_panics);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].variable, ENV_MAX_PASS_BATCH);
    }

    #[test]
    fn builder_clamps_batch() {
        assert_eq!(RuntimeConfig::default().with_max_pass_batch(0).max_pass_batch, 1);
    }
}
