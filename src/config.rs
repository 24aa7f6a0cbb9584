//! codehost configuration management.
//!
//! Handles the configuration file at:
//! - Linux/macOS: ~/.config/codehost/config.toml
//! - Windows: %APPDATA%\codehost\config.toml

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::fs_utils;
use crate::paths::InstallLayout;
use crate::session::EditorOptions;

/// codehost configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HostConfig {
    /// Filesystem settings
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Editor server settings
    #[serde(default)]
    pub editor: EditorConfig,

    /// Supervisor settings
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Profile settings
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Filesystem configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PathsConfig {
    /// Base root of the private runtime
    #[serde(default)]
    pub base: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Editor server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorConfig {
    #[serde(default = "default_editor_port")]
    pub port: u16,
    #[serde(default)]
    pub listen_on_all_interfaces: bool,
    #[serde(default)]
    pub use_ssl: bool,
}

fn default_editor_port() -> u16 {
    13337
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            port: default_editor_port(),
            listen_on_all_interfaces: false,
            use_ssl: false,
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupervisorConfig {
    /// Upper bound on the wait for sessions to die after a stop
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Slots in the install progress channel
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,
    /// Localhost port of the control channel
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// OS capability level handed to the environment builder
    #[serde(default = "default_os_level")]
    pub os_level: u32,
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

fn default_progress_capacity() -> usize {
    64
}

fn default_control_port() -> u16 {
    9848
}

fn default_os_level() -> u32 {
    30
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
            progress_capacity: default_progress_capacity(),
            control_port: default_control_port(),
            os_level: default_os_level(),
        }
    }
}

/// Profile configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileConfig {
    /// Override of the detected profile serial
    #[serde(default)]
    pub serial: Option<u64>,
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

impl HostConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("codehost")
            .join("config.toml")
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self, HostError> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, HostError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| HostError::ConfigError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| HostError::ConfigError {
            message: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), HostError> {
        self.save_to(&Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), HostError> {
        let content = toml::to_string_pretty(self).map_err(|e| HostError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs_utils::atomic_write(path, content.as_bytes()).map_err(|e| HostError::FilesystemWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Layout derived from the configured base root
    pub fn layout(&self) -> InstallLayout {
        let base = self
            .paths
            .base
            .clone()
            .unwrap_or_else(InstallLayout::default_base);
        InstallLayout::new(base)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.supervisor.stop_timeout_ms)
    }

    pub fn editor_options(&self) -> EditorOptions {
        EditorOptions {
            port: self.editor.port,
            listen_on_all_interfaces: self.editor.listen_on_all_interfaces,
            use_ssl: self.editor.use_ssl,
        }
    }

    /// Get a configuration value by key path (e.g., "editor.port")
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["paths", "base"] => self.paths.base.as_ref().map(|p| p.display().to_string()),
            ["logging", "level"] => Some(self.logging.level.clone()),
            ["editor", "port"] => Some(self.editor.port.to_string()),
            ["editor", "listen_on_all_interfaces"] => {
                Some(self.editor.listen_on_all_interfaces.to_string())
            }
            ["editor", "use_ssl"] => Some(self.editor.use_ssl.to_string()),
            ["supervisor", "stop_timeout_ms"] => Some(self.supervisor.stop_timeout_ms.to_string()),
            ["supervisor", "progress_capacity"] => {
                Some(self.supervisor.progress_capacity.to_string())
            }
            ["supervisor", "control_port"] => Some(self.supervisor.control_port.to_string()),
            ["supervisor", "os_level"] => Some(self.supervisor.os_level.to_string()),
            ["profile", "serial"] => self.profile.serial.map(|s| s.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key path
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), HostError> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["paths", "base"] => {
                self.paths.base = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            ["logging", "level"] => {
                if !LOG_LEVELS.contains(&value) {
                    return Err(HostError::ConfigError {
                        message: format!(
                            "Invalid log level: {}. Must be one of: {}",
                            value,
                            LOG_LEVELS.join(", ")
                        ),
                    });
                }
                self.logging.level = value.to_string();
            }
            ["editor", "port"] => self.editor.port = parse_value(key, value)?,
            ["editor", "listen_on_all_interfaces"] => {
                self.editor.listen_on_all_interfaces = parse_value(key, value)?
            }
            ["editor", "use_ssl"] => self.editor.use_ssl = parse_value(key, value)?,
            ["supervisor", "stop_timeout_ms"] => {
                self.supervisor.stop_timeout_ms = parse_value(key, value)?
            }
            ["supervisor", "progress_capacity"] => {
                let capacity: usize = parse_value(key, value)?;
                if capacity == 0 {
                    return Err(HostError::ConfigError {
                        message: "progress_capacity must be at least 1".to_string(),
                    });
                }
                self.supervisor.progress_capacity = capacity;
            }
            ["supervisor", "control_port"] => {
                self.supervisor.control_port = parse_value(key, value)?
            }
            ["supervisor", "os_level"] => self.supervisor.os_level = parse_value(key, value)?,
            ["profile", "serial"] => {
                self.profile.serial = if value.is_empty() {
                    None
                } else {
                    Some(parse_value(key, value)?)
                };
            }
            _ => {
                return Err(HostError::ConfigError {
                    message: format!("Unknown configuration key: {}", key),
                });
            }
        }
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Display configuration as TOML text
    pub fn display(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|e| format!("# unprintable config: {}\n", e))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, HostError> {
    value.parse().map_err(|_| HostError::ConfigError {
        message: format!("Invalid value for {}: {}", key, value),
    })
}
