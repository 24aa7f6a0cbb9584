//! Install command handler

use console::style;

use super::{install_progress_bar, runtime, show_progress, CommandContext};
use crate::archive::FileSource;
use crate::cli::InstallArgs;
use crate::error::Result;
use crate::service::{install_runtime, installer_for, ConsoleUi, UNSUPPORTED_PROFILE_TITLE};
use crate::session::UiHandle;

/// Run the install command
pub fn run_install(args: &InstallArgs, ctx: &CommandContext) -> Result<String> {
    let mut config = ctx.load_config()?;
    if let Some(serial) = args.profile {
        config.profile.serial = Some(serial);
    }
    let installer = installer_for(&config);
    let source = Box::new(FileSource::new(&args.archive));

    let pb = (!args.quiet).then(install_progress_bar);
    let result = runtime()?.block_on(install_runtime(
        installer,
        source,
        config.supervisor.progress_capacity,
        |event| show_progress(pb.as_ref(), event),
    ));
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if e.is_fatal() {
                ConsoleUi.show_blocking_error(UNSUPPORTED_PROFILE_TITLE, &e.to_string());
            }
            return Err(e);
        }
    };

    let mut out = format!(
        "{} Installed {} into {}\n",
        style("✓").green(),
        args.archive.display(),
        report.root.display()
    );
    out.push_str(&format!(
        "  {} entries: {} files, {} directories, {} symlinks, {} hard links\n",
        report.summary.entries,
        report.summary.files,
        report.summary.directories,
        report.summary.symlinks,
        report.summary.hard_links
    ));
    if ctx.verbose {
        out.push_str(&format!(
            "  {} bytes written, {} made executable, {:.1}s\n",
            report.summary.bytes_written,
            report.made_executable,
            report.duration.as_secs_f64()
        ));
    }
    Ok(out)
}
