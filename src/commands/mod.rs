//! Command modules for the codehost CLI
//!
//! Each command module implements a single top-level command:
//! - `install` - unpack a runtime archive
//! - `serve` - run the supervised service
//! - `control` - stop / status / open against a running service
//! - `env` - print the child environment
//! - `config` - manage the configuration file
//!
//! All command handlers take their respective `Args` struct from `cli.rs`
//! and a shared `CommandContext`, and return the text to print.

pub mod config;
pub mod control;
pub mod env;
pub mod install;
pub mod serve;

pub use config::run_config;
pub use control::run_control;
pub use env::run_env;
pub use install::run_install;
pub use serve::run_serve;

use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::archive::ProgressEvent;
use crate::config::HostConfig;
use crate::error::{HostError, Result};

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Base directory override
    pub base: Option<PathBuf>,
    /// Show verbose output
    pub verbose: bool,
}

impl CommandContext {
    /// Configuration file in effect
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(HostConfig::default_path)
    }

    /// Load configuration with command-line overrides applied
    pub fn load_config(&self) -> Result<HostConfig> {
        let mut config = HostConfig::load_from(&self.config_path())?;
        if let Some(base) = &self.base {
            config.paths.base = Some(base.clone());
        }
        Ok(config)
    }
}

/// Multi-thread runtime for commands that talk async
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| HostError::ConfigError {
        message: format!("Failed to create tokio runtime: {}", e),
    })
}

/// Progress bar fed by install progress events
pub(crate) fn install_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message("Installing runtime");
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Apply one progress event to an optional bar
pub(crate) fn show_progress(pb: Option<&ProgressBar>, event: ProgressEvent) {
    match pb {
        Some(pb) => {
            pb.set_length(event.total as u64);
            pb.set_position(event.processed as u64);
        }
        None => tracing::debug!(
            "Install progress {}/{} ({:.0}%)",
            event.processed,
            event.total,
            event.fraction() * 100.0
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_override_wins() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(&config_path, "[paths]\nbase = \"/from/file\"\n").unwrap();

        let ctx = CommandContext {
            config_path: Some(config_path.clone()),
            base: None,
            verbose: false,
        };
        assert_eq!(
            ctx.load_config().unwrap().paths.base,
            Some(PathBuf::from("/from/file"))
        );

        let ctx = CommandContext {
            base: Some(PathBuf::from("/from/flag")),
            ..ctx
        };
        assert_eq!(
            ctx.load_config().unwrap().layout().base(),
            std::path::Path::new("/from/flag")
        );
    }
}
