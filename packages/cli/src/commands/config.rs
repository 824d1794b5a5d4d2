use std::collections::BTreeMap;

use anyhow::bail;
use db::repositories::ConfigEntry;
use queue_core::settings::{KNOWN_KEYS, is_known_key};

use crate::context::Context;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum ConfigCommands {
    /// Show one setting, or every setting when no key is given
    Get {
        /// Setting name, e.g. backoff_base
        key: Option<String>,
    },
    /// Store a setting
    Set {
        /// Setting name: max_retries, backoff_base or lock_timeout_seconds
        key: String,
        value: String,
    },
}

/// A setting as workers will see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSetting {
    pub key: String,
    pub value: String,
    pub is_default: bool,
}

/// Stored entries merged with defaults for known keys that were never set.
pub fn effective_settings(stored: &[ConfigEntry]) -> Vec<EffectiveSetting> {
    let mut merged: BTreeMap<&str, EffectiveSetting> = KNOWN_KEYS
        .iter()
        .map(|(key, value)| {
            (
                *key,
                EffectiveSetting {
                    key: key.to_string(),
                    value: value.to_string(),
                    is_default: true,
                },
            )
        })
        .collect();

    for entry in stored {
        merged.insert(
            &entry.key,
            EffectiveSetting {
                key: entry.key.clone(),
                value: entry.value.clone(),
                is_default: false,
            },
        );
    }

    merged.into_values().collect()
}

pub async fn run(ctx: &Context, cmd: ConfigCommands) -> anyhow::Result<()> {
    let queue = ctx.open().await?;
    let config = queue.engine.config().clone();

    match cmd {
        ConfigCommands::Get { key: Some(key) } => {
            let stored = config.get(&key).await?;
            let default = KNOWN_KEYS
                .iter()
                .find(|(known, _)| *known == key)
                .map(|(_, value)| *value);

            match (stored, default) {
                (Some(value), _) => println!("{key} = {value}"),
                (None, Some(value)) => println!("{key} = {value} (default)"),
                (None, None) => bail!("config key not found: {key}"),
            }
        }
        ConfigCommands::Get { key: None } => {
            println!("Configuration");
            println!();
            for setting in effective_settings(&config.list().await?) {
                let marker = if setting.is_default { " (default)" } else { "" };
                println!("  {:<25} = {}{}", setting.key, setting.value, marker);
            }
        }
        ConfigCommands::Set { key, value } => {
            let entry = config.set(&key, &value).await?;
            if !is_known_key(&entry.key) {
                tracing::warn!(key = %entry.key, "stored a key the queue does not read");
            }
            println!("Config updated: {} = {}", entry.key, entry.value);
        }
    }

    queue.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> ConfigEntry {
        ConfigEntry {
            key: key.into(),
            value: value.into(),
        }
    }

    #[test]
    fn defaults_fill_unset_known_keys() {
        let settings = effective_settings(&[entry("backoff_base", "5"), entry("color", "blue")]);
        let view: Vec<_> = settings
            .iter()
            .map(|s| (s.key.as_str(), s.value.as_str(), s.is_default))
            .collect();

        assert_eq!(
            view,
            vec![
                ("backoff_base", "5", false),
                ("color", "blue", false),
                ("lock_timeout_seconds", "300", true),
                ("max_retries", "3", true),
            ]
        );
    }
}
