//! Config command handler

use console::style;

use super::CommandContext;
use crate::cli::{ConfigArgs, ConfigOperation};
use crate::config::HostConfig;
use crate::error::Result;

/// Run the config command
pub fn run_config(args: &ConfigArgs, ctx: &CommandContext) -> Result<String> {
    let path = ctx.config_path();
    match &args.operation {
        ConfigOperation::Show => {
            let config = HostConfig::load_from(&path)?;
            Ok(format!(
                "# {}\n{}",
                style(path.display()).dim(),
                config.display()
            ))
        }
        ConfigOperation::Set { key, value } => {
            let mut config = HostConfig::load_from(&path)?;
            config.set(key, value)?;
            config.save_to(&path)?;
            Ok(format!("{} Set {} = {}\n", style("✓").green(), key, value))
        }
        ConfigOperation::Reset => {
            let mut config = HostConfig::load_from(&path)?;
            config.reset();
            config.save_to(&path)?;
            Ok(format!(
                "{} Configuration reset to defaults\n",
                style("✓").green()
            ))
        }
    }
}
