//! Tunables read from the configuration store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Config key for the global attempt ceiling.
pub const MAX_RETRIES_KEY: &str = "max_retries";
/// Config key for the exponential backoff base, in seconds.
pub const BACKOFF_BASE_KEY: &str = "backoff_base";
/// Config key for the lock staleness window, in seconds.
pub const LOCK_TIMEOUT_KEY: &str = "lock_timeout_seconds";

pub const DEFAULT_BACKOFF_BASE: u32 = 2;
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 300;

/// Keys with a typed meaning, and their defaults as stored strings.
pub const KNOWN_KEYS: [(&str, &str); 3] = [
    (BACKOFF_BASE_KEY, "2"),
    (LOCK_TIMEOUT_KEY, "300"),
    (MAX_RETRIES_KEY, "3"),
];

/// A rejected config value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("config key must not be empty")]
    EmptyKey,
    #[error("invalid value '{value}' for {key}: expected a positive integer")]
    NotPositive { key: String, value: String },
}

/// Queue settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Global attempt ceiling; `None` lets each job's own `max_retries` decide.
    pub max_retries: Option<u32>,
    /// Base of the exponential backoff.
    pub backoff_base: u32,
    /// Age after which a worker's lock is presumed abandoned.
    pub lock_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff_base: DEFAULT_BACKOFF_BASE,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }
}

impl QueueSettings {
    /// Build settings from stored `(key, value)` pairs.
    ///
    /// Unknown keys are ignored. Malformed values for known keys fall back to
    /// the default, so a bad manual edit never stops the workers.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut settings = Self::default();
        for (key, value) in entries {
            let Ok(parsed) = parse_positive(key, value) else {
                continue;
            };
            match key {
                MAX_RETRIES_KEY => settings.max_retries = u32::try_from(parsed).ok(),
                BACKOFF_BASE_KEY => {
                    settings.backoff_base = u32::try_from(parsed).unwrap_or(DEFAULT_BACKOFF_BASE)
                }
                LOCK_TIMEOUT_KEY => settings.lock_timeout = Duration::from_secs(parsed),
                _ => {}
            }
        }
        settings
    }

    /// Attempt ceiling for `job_max_retries`, honouring a global override.
    pub fn retry_ceiling(&self, job_max_retries: u32) -> u32 {
        self.max_retries.unwrap_or(job_max_retries)
    }
}

/// Check a value before it is written under `key`.
pub fn validate_entry(key: &str, value: &str) -> Result<(), SettingsError> {
    if key.trim().is_empty() {
        return Err(SettingsError::EmptyKey);
    }
    if is_known_key(key) {
        parse_positive(key, value)?;
    }
    Ok(())
}

/// Whether `key` is one of the typed settings.
pub fn is_known_key(key: &str) -> bool {
    KNOWN_KEYS.iter().any(|(known, _)| *known == key)
}

fn parse_positive(key: &str, value: &str) -> Result<u64, SettingsError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 && n <= u64::from(u32::MAX) => Ok(n),
        _ => Err(SettingsError::NotPositive {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_ceiling_to_the_job() {
        let settings = QueueSettings::from_entries([]);
        assert_eq!(settings, QueueSettings::default());
        assert_eq!(settings.retry_ceiling(2), 2);
    }

    #[test]
    fn stored_values_override_defaults() {
        let settings = QueueSettings::from_entries([
            ("backoff_base", "3"),
            ("lock_timeout_seconds", "60"),
            ("max_retries", "5"),
            ("colour", "blue"),
        ]);
        assert_eq!(settings.backoff_base, 3);
        assert_eq!(settings.lock_timeout, Duration::from_secs(60));
        assert_eq!(settings.retry_ceiling(2), 5);
    }

    #[test]
    fn malformed_values_fall_back() {
        let settings = QueueSettings::from_entries([("backoff_base", "fast"), ("max_retries", "0")]);
        assert_eq!(settings.backoff_base, DEFAULT_BACKOFF_BASE);
        assert_eq!(settings.max_retries, None);
    }

    #[test]
    fn validation_only_constrains_known_keys() {
        assert!(validate_entry("backoff_base", "4").is_ok());
        assert!(matches!(
            validate_entry("backoff_base", "-1"),
            Err(SettingsError::NotPositive { .. })
        ));
        assert!(validate_entry("owner", "ops team").is_ok());
        assert_eq!(validate_entry(" ", "x"), Err(SettingsError::EmptyKey));
    }
}
