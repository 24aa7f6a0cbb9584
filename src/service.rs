//! The long-running host service
//!
//! Wires the pieces together: installs the runtime when needed, starts the
//! registry, status reporter and supervisor, opens the control channel and
//! launches the editor session. Returns once the supervisor has stopped.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::archive::{
    spawn_install, ArchiveSource, FileSource, InstallReport, Installer, ProgressEvent,
};
use crate::config::HostConfig;
use crate::control::{control_addr, serve_control};
use crate::error::{HostError, Result};
use crate::session::{
    LeaseKind, ProcessRegistry, SessionKind, SessionLauncher, SessionRegistry, UiHandle,
};
use crate::status::{FileStatusSink, StatusReporter};
use crate::supervisor::{spawn_event_pump, Command, StopReport, Supervisor};

/// File under TMP that carries the status record
pub const STATUS_FILE: &str = "codehost-status.json";

/// Title of the blocking message shown for a secondary profile
pub const UNSUPPORTED_PROFILE_TITLE: &str = "Unsupported profile";

/// Terminal-backed UI: messages go to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleUi;

impl UiHandle for ConsoleUi {
    fn bring_to_front(&self) {
        tracing::info!("Editor host UI requested");
    }

    fn show_blocking_error(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }
}

/// Options for one run of the service
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Archive to install from when the runtime is missing
    pub archive: Option<PathBuf>,
    /// Install even if the runtime already looks installed
    pub reinstall: bool,
    pub wake_lock: bool,
    pub wifi_lock: bool,
}

/// Installer for the configured layout, honouring a profile override
pub fn installer_for(config: &HostConfig) -> Installer {
    let installer = Installer::new(config.layout());
    match config.profile.serial {
        Some(serial) => installer.with_profile_serial(serial),
        None => installer,
    }
}

/// Run an install on the blocking pool, feeding progress to `on_progress`
pub async fn install_runtime<F>(
    installer: Installer,
    source: Box<dyn ArchiveSource>,
    capacity: usize,
    mut on_progress: F,
) -> Result<InstallReport>
where
    F: FnMut(ProgressEvent),
{
    let (handle, mut progress) = spawn_install(installer, source, capacity);
    while let Some(event) = progress.recv().await {
        on_progress(event);
    }
    handle
        .await
        .map_err(|e| HostError::archive(format!("install worker failed: {}", e)))?
}

/// Run the service until a stop command or Ctrl-C
pub async fn run<F>(
    config: &HostConfig,
    options: ServiceOptions,
    ui: Arc<dyn UiHandle>,
    on_progress: F,
) -> Result<StopReport>
where
    F: FnMut(ProgressEvent),
{
    let layout = config.layout();

    if options.reinstall || !layout.is_installed() {
        let archive = options.archive.clone().ok_or_else(|| HostError::ArchiveRead {
            message: format!(
                "runtime is not installed under {} and no archive was given",
                layout.root().display()
            ),
        })?;
        let installer = installer_for(config);
        let result = install_runtime(
            installer,
            Box::new(FileSource::new(archive)),
            config.supervisor.progress_capacity,
            on_progress,
        )
        .await;
        match result {
            Ok(report) => tracing::info!(
                "Installed {} entries into {}",
                report.summary.entries,
                report.root.display()
            ),
            Err(e) => {
                if e.is_fatal() {
                    ui.show_blocking_error(UNSUPPORTED_PROFILE_TITLE, &e.to_string());
                }
                return Err(e);
            }
        }
    } else {
        tracing::debug!("Runtime already installed at {}", layout.root().display());
    }

    let launcher = SessionLauncher::new(
        layout.clone(),
        config.supervisor.os_level,
        config.editor_options(),
    );
    let registry = ProcessRegistry::new(launcher);
    registry.request_lease(LeaseKind::WakeLock, options.wake_lock);
    registry.request_lease(LeaseKind::WifiLock, options.wifi_lock);

    let reporter = StatusReporter::new(Arc::new(FileStatusSink::new(
        layout.tmp().join(STATUS_FILE),
    )));
    let registry_handle: Arc<dyn SessionRegistry> = registry.clone();
    let mut supervisor = Supervisor::new(registry_handle, reporter, config.stop_timeout());
    supervisor.mark_installed();
    supervisor.attach(ui);

    let mut shutdown = supervisor.shutdown_signal();
    let events = registry.subscribe();
    let supervisor = Arc::new(Mutex::new(supervisor));
    let pump = spawn_event_pump(Arc::clone(&supervisor), events);

    let addr = control_addr(config.supervisor.control_port);
    let listener = TcpListener::bind(addr).await.map_err(|e| HostError::Control {
        message: format!("Failed to bind {}: {}", addr, e),
    })?;
    let control = tokio::spawn(serve_control(
        listener,
        Arc::clone(&supervisor),
        shutdown.clone(),
    ));

    let editor = supervisor.lock().await.spawn(SessionKind::Editor);
    if let Err(e) = editor {
        tracing::error!("{}", e);
        supervisor.lock().await.handle_command(Command::Stop).await;
        let _ = control.await;
        pump.abort();
        return Err(e);
    }
    tracing::info!("Editor host running; control channel on {}", addr);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Interrupted, stopping");
                supervisor.lock().await.handle_command(Command::Stop).await;
            }
        }
    }

    let _ = control.await;
    pump.abort();
    let mut supervisor = supervisor.lock().await;
    supervisor.detach();
    tracing::info!("Editor host stopped");
    Ok(supervisor.last_stop().unwrap_or_default())
}
