//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Installs and supervises a self-hosted editor runtime
#[derive(Parser, Debug)]
#[command(name = "codehost")]
#[command(about = "Install a bundled editor runtime and supervise its sessions")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: <config_dir>/codehost/config.toml)
    #[arg(long, value_name = "PATH", global = true, env = "CODEHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base directory of the private runtime (overrides paths.base)
    #[arg(long, value_name = "DIR", global = true)]
    pub base: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================
// Main Commands Enum
// ============================================

/// Available subcommands for codehost
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Unpack a runtime archive into the private root
    #[command(visible_alias = "i")]
    Install(InstallArgs),

    /// Run the service: install if needed, start the editor, wait for commands
    Serve(ServeArgs),

    /// Ask a running service to stop every session and exit
    Stop(ControlArgs),

    /// Show the state of a running service
    Status(ControlArgs),

    /// Ask a running service to bring its UI to the front
    Open(ControlArgs),

    /// Start a new terminal session in a running service
    #[command(visible_alias = "t")]
    Terminal(ControlArgs),

    /// Print the environment children are launched with
    Env(EnvArgs),

    /// Manage codehost configuration
    Config(ConfigArgs),
}

// ============================================
// Install Subcommand
// ============================================

/// Arguments for the install command
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// gzip-compressed tar archive holding the runtime
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Install as this profile serial instead of the detected one
    #[arg(long, value_name = "SERIAL")]
    pub profile: Option<u64>,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

// ============================================
// Serve Subcommand
// ============================================

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Archive to install from when the runtime is missing
    #[arg(long, value_name = "ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Reinstall from the archive even if the runtime is present
    #[arg(long, requires = "archive")]
    pub reinstall: bool,

    /// Hold the wake lock while sessions are live
    #[arg(long)]
    pub wake_lock: bool,

    /// Hold the wifi lock while sessions are live
    #[arg(long)]
    pub wifi_lock: bool,

    /// Editor server port (overrides editor.port)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Control channel port (overrides supervisor.control_port)
    #[arg(long, value_name = "PORT")]
    pub control_port: Option<u16>,
}

// ============================================
// Stop / Status / Open / Terminal Subcommands
// ============================================

/// Arguments for commands sent over the control channel
#[derive(Args, Debug)]
pub struct ControlArgs {
    /// Control channel port (overrides supervisor.control_port)
    #[arg(long, value_name = "PORT")]
    pub control_port: Option<u16>,

    /// Print the raw JSON reply
    #[arg(long)]
    pub json: bool,
}

// ============================================
// Env Subcommand
// ============================================

/// Arguments for the env command
#[derive(Args, Debug)]
pub struct EnvArgs {
    /// OS capability level (overrides supervisor.os_level)
    #[arg(long, value_name = "LEVEL")]
    pub os_level: Option<u32>,
}

// ============================================
// Config Subcommand
// ============================================

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config operation: show, set, reset
    #[command(subcommand)]
    pub operation: ConfigOperation,
}

/// Config subcommand operations
#[derive(Subcommand, Debug)]
pub enum ConfigOperation {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., editor.port, logging.level)
        key: String,
        /// Value to set
        value: String,
    },

    /// Reset configuration to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::parse_from([
            "codehost",
            "serve",
            "--archive",
            "bundle.tgz",
            "--reinstall",
            "--wake-lock",
        ]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.archive, Some(PathBuf::from("bundle.tgz")));
                assert!(args.reinstall);
                assert!(args.wake_lock);
                assert!(!args.wifi_lock);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_reinstall_requires_archive() {
        assert!(Cli::try_parse_from(["codehost", "serve", "--reinstall"]).is_err());
    }

    #[test]
    fn test_parse_terminal_alias() {
        let cli = Cli::parse_from(["codehost", "t", "--control-port", "9000"]);
        match cli.command {
            Commands::Terminal(args) => assert_eq!(args.control_port, Some(9000)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::parse_from(["codehost", "config", "set", "editor.port", "8080"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                operation: ConfigOperation::Set { key, value },
            }) => {
                assert_eq!(key, "editor.port");
                assert_eq!(value, "8080");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
