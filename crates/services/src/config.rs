use std::env;
use std::time::Duration;

/// Upper bound applied to every Catalog Store call unless overridden.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

const STORE_TIMEOUT_VAR: &str = "LEARN_STORE_TIMEOUT_MS";

/// Tunables for `ProgressService`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressConfig {
    pub store_timeout: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl ProgressConfig {
    /// Read overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset, blank, zero or unparsable
    /// values fall back to the defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(STORE_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.store_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(
                    value = %raw,
                    "ignoring invalid {STORE_TIMEOUT_VAR}, using {:?}",
                    DEFAULT_STORE_TIMEOUT
                ),
            }
        }
        config
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_timeout_override() {
        let config = ProgressConfig::from_lookup(|key| {
            (key == "LEARN_STORE_TIMEOUT_MS").then(|| "2500".to_string())
        });
        assert_eq!(config.store_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn invalid_values_keep_default() {
        for raw in ["", "abc", "0", "-5"] {
            let config = ProgressConfig::from_lookup(|_| Some(raw.to_string()));
            assert_eq!(config, ProgressConfig::default());
        }
        assert_eq!(ProgressConfig::from_lookup(|_| None), ProgressConfig::default());
    }
}
