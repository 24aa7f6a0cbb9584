//! Serve command handler
//!
//! Runs the editor host in the foreground until it receives a stop command
//! over the control channel or Ctrl-C.

use std::sync::Arc;

use indicatif::ProgressBar;

use super::{install_progress_bar, runtime, show_progress, CommandContext};
use crate::cli::ServeArgs;
use crate::error::Result;
use crate::service::{self, ConsoleUi, ServiceOptions};

/// Run the service
pub fn run_serve(args: &ServeArgs, ctx: &CommandContext) -> Result<String> {
    let mut config = ctx.load_config()?;
    if let Some(port) = args.port {
        config.editor.port = port;
    }
    if let Some(port) = args.control_port {
        config.supervisor.control_port = port;
    }

    tracing::info!("Starting codehost v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Runtime root: {}", config.layout().root().display());

    let options = ServiceOptions {
        archive: args.archive.clone(),
        reinstall: args.reinstall,
        wake_lock: args.wake_lock,
        wifi_lock: args.wifi_lock,
    };

    // Only drawn if an install actually runs
    let mut pb: Option<ProgressBar> = None;
    let report = runtime()?.block_on(service::run(
        &config,
        options,
        Arc::new(ConsoleUi),
        |event| {
            let bar = pb.get_or_insert_with(install_progress_bar);
            show_progress(Some(bar), event);
            if event.is_complete() {
                bar.finish_and_clear();
            }
        },
    ));
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let report = report?;

    let mut out = format!(
        "Stopped: {} session(s) signalled, {} kill(s) failed",
        report.attempted, report.failed
    );
    if report.timed_out {
        out.push_str(&format!(
            ", deadline passed with {} kill(s) unresolved",
            report.unresolved
        ));
    }
    out.push('\n');
    Ok(out)
}
