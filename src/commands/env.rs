//! Env command handler

use super::CommandContext;
use crate::cli::EnvArgs;
use crate::env::{build_environment, ProcessEnv};
use crate::error::Result;

/// Print the environment a child would be launched with, one `NAME=value` per line
pub fn run_env(args: &EnvArgs, ctx: &CommandContext) -> Result<String> {
    let config = ctx.load_config()?;
    let os_level = args.os_level.unwrap_or(config.supervisor.os_level);
    let env = build_environment(&config.layout(), os_level, &ProcessEnv);

    let mut out = String::new();
    for line in env.to_strings() {
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
