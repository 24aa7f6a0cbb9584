//! codehost CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use codehost::commands::{
    run_config, run_control, run_env, run_install, run_serve, CommandContext,
};
use codehost::control::ControlRequest;
use codehost::session::SessionKind;
use codehost::{Cli, Commands, HostConfig, HostError};

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<HostError>() {
                Some(host) => host.exit_code(),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn run() -> anyhow::Result<String> {
    let cli = Cli::parse();
    let ctx = CommandContext {
        config_path: cli.config.clone(),
        base: cli.base.clone(),
        verbose: cli.verbose,
    };

    init_tracing(&ctx);

    let output = match &cli.command {
        Commands::Install(args) => run_install(args, &ctx)?,
        Commands::Serve(args) => run_serve(args, &ctx)?,
        Commands::Stop(args) => run_control(ControlRequest::Stop, args, &ctx)?,
        Commands::Status(args) => run_control(ControlRequest::Status, args, &ctx)?,
        Commands::Open(args) => run_control(ControlRequest::Open, args, &ctx)?,
        Commands::Terminal(args) => run_control(
            ControlRequest::Spawn {
                kind: SessionKind::Terminal,
            },
            args,
            &ctx,
        )?,
        Commands::Env(args) => run_env(args, &ctx)?,
        Commands::Config(args) => run_config(args, &ctx)?,
    };
    Ok(output)
}

/// Log to stderr at `--verbose` or `logging.level`, plus any `RUST_LOG` directives
fn init_tracing(ctx: &CommandContext) {
    let level = if ctx.verbose {
        "debug".to_string()
    } else {
        // A broken config file is reported by the command itself
        HostConfig::load_from(&ctx.config_path())
            .map(|config| config.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };

    let filter = match format!("codehost={}", level).parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
