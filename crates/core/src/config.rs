//! Process-wide settings and their live-reload holder
//!
//! [`ExtensionConfig`] is the complete settings value. It is never mutated in
//! place: [`ConfigHolder::replace`] swaps the whole value and notifies every
//! [`ConfigSubscription`]. Components keep a `ConfigHolder` handle and read
//! `current()` at the moment they act, so an in-flight operation always sees
//! one consistent value.
//!
//! Settings are resolved from, in increasing precedence: built-in defaults,
//! a TOML settings file, `BERTH_*` environment variables and finally whatever
//! the host applies on top (CLI flags).

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// Default ceiling for captured process output (10 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default execution bound for a single CLI invocation
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Complete settings value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionConfig {
    /// Container CLI binary (name on PATH or absolute path)
    pub binary_path: String,
    /// Auto-refresh period; 0 disables polling
    pub poll_interval_ms: u64,
    /// Include stopped containers in container lists
    pub show_stopped: bool,
    /// Shell used for interactive sessions inside containers
    pub default_shell: String,
    /// Ask before destructive operations
    pub confirm_before_delete: bool,
    pub command_timeout_ms: u64,
    pub max_output_bytes: usize,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            binary_path: "docker".to_string(),
            poll_interval_ms: 5_000,
            show_stopped: true,
            default_shell: "/bin/sh".to_string(),
            confirm_before_delete: true,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExtensionConfig {
    /// Polling period, `None` when polling is disabled
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary_path.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "binaryPath cannot be empty".to_string(),
            });
        }
        if self.default_shell.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "defaultShell cannot be empty".to_string(),
            });
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "commandTimeoutMs must be greater than zero".to_string(),
            });
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "maxOutputBytes must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings file discovery and loading
pub struct ConfigLoader;

impl ConfigLoader {
    /// `<config dir>/berth/settings.toml` for the current platform
    pub fn default_settings_path() -> Option<PathBuf> {
        directories_next::ProjectDirs::from("", "", "berth")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Parse a settings file. Missing keys take their defaults.
    #[instrument]
    pub fn load_from_path(path: &Path) -> Result<ExtensionConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: ExtensionConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parsing {
                message: e.to_string(),
            })?;
        debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Resolve settings from an explicit file (which must exist) or the
    /// default location (used only when present), then apply environment
    /// overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<ExtensionConfig, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => match Self::default_settings_path() {
                Some(path) if path.exists() => Self::load_from_path(&path)?,
                _ => ExtensionConfig::default(),
            },
        };
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BERTH_*` overrides read through `lookup`
    pub fn apply_overrides<F>(config: &mut ExtensionConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("BERTH_BINARY") {
            config.binary_path = value;
        }
        if let Some(value) = lookup("BERTH_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_number("BERTH_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("BERTH_SHOW_STOPPED") {
            config.show_stopped = parse_flag("BERTH_SHOW_STOPPED", &value)?;
        }
        if let Some(value) = lookup("BERTH_DEFAULT_SHELL") {
            config.default_shell = value;
        }
        if let Some(value) = lookup("BERTH_CONFIRM_BEFORE_DELETE") {
            config.confirm_before_delete = parse_flag("BERTH_CONFIRM_BEFORE_DELETE", &value)?;
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Validation {
        message: format!("{} must be a non-negative integer, got '{}'", key, value),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Validation {
            message: format!("{} must be a boolean, got '{}'", key, value),
        }),
    }
}

/// Owned holder of the current settings with change subscription
#[derive(Debug, Clone)]
pub struct ConfigHolder {
    sender: Arc<watch::Sender<Arc<ExtensionConfig>>>,
}

impl ConfigHolder {
    pub fn new(config: ExtensionConfig) -> Self {
        let (sender, _) = watch::channel(Arc::new(config));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// The settings value in effect right now
    pub fn current(&self) -> Arc<ExtensionConfig> {
        self.sender.borrow().clone()
    }

    /// Replace the whole settings value and notify subscribers
    pub fn replace(&self, config: ExtensionConfig) {
        info!(
            binary = %config.binary_path,
            poll_interval_ms = config.poll_interval_ms,
            "Settings replaced"
        );
        self.sender.send_replace(Arc::new(config));
    }

    /// Derive a new value from the current one and install it
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ExtensionConfig),
    {
        let mut next = (*self.current()).clone();
        f(&mut next);
        self.replace(next);
    }

    pub fn subscribe(&self) -> ConfigSubscription {
        ConfigSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Live subscriptions; dropping a [`ConfigSubscription`] releases it
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ConfigHolder {
    fn default() -> Self {
        Self::new(ExtensionConfig::default())
    }
}

/// Change feed for a [`ConfigHolder`]
#[derive(Debug)]
pub struct ConfigSubscription {
    receiver: watch::Receiver<Arc<ExtensionConfig>>,
}

impl ConfigSubscription {
    /// Wait for the next replacement. Returns `None` once the holder is gone.
    pub async fn changed(&mut self) -> Option<Arc<ExtensionConfig>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ExtensionConfig::default();
        assert_eq!(config.binary_path, "docker");
        assert_eq!(config.poll_interval(), Some(Duration::from_millis(5000)));
        assert!(config.show_stopped);
        assert!(config.confirm_before_delete);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_disables_polling() {
        let config = ExtensionConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ExtensionConfig =
            toml::from_str("binaryPath = \"/usr/local/bin/container\"\npollIntervalMs = 0\n")
                .unwrap();
        assert_eq!(config.binary_path, "/usr/local/bin/container");
        assert_eq!(config.poll_interval_ms, 0);
        assert_eq!(config.default_shell, "/bin/sh");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BERTH_BINARY", "podman"),
            ("BERTH_POLL_INTERVAL_MS", "2500"),
            ("BERTH_SHOW_STOPPED", "no"),
            ("BERTH_CONFIRM_BEFORE_DELETE", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = ExtensionConfig::default();
        ConfigLoader::apply_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.binary_path, "podman");
        assert_eq!(config.poll_interval_ms, 2500);
        assert!(!config.show_stopped);
        assert!(!config.confirm_before_delete);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = ExtensionConfig::default();
        let result = ConfigLoader::apply_overrides(&mut config, |key| {
            (key == "BERTH_POLL_INTERVAL_MS").then(|| "-5".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_binary() {
        let config = ExtensionConfig {
            binary_path: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = ConfigLoader::load_from_path(Path::new("/nonexistent/berth/settings.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_holder_replace_notifies_subscribers() {
        let holder = ConfigHolder::default();
        let mut subscription = holder.subscribe();
        assert_eq!(holder.subscriber_count(), 1);

        holder.update(|c| c.poll_interval_ms = 1000);
        let seen = subscription.changed().await.unwrap();
        assert_eq!(seen.poll_interval_ms, 1000);
        assert_eq!(holder.current().poll_interval_ms, 1000);

        drop(subscription);
        assert_eq!(holder.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_unaffected_by_later_replace() {
        let holder = ConfigHolder::default();
        let before = holder.current();
        holder.update(|c| c.binary_path = "podman".to_string());
        assert_eq!(before.binary_path, "docker");
        assert_eq!(holder.current().binary_path, "podman");
    }
}
