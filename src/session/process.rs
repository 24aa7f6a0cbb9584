//! Process-backed session registry
//!
//! Each session is a child process started with the environment from
//! [`build_environment`](crate::env::build_environment) and watched by its own
//! monitor task. The monitor owns the `Child`; a kill request reaches it
//! through a oneshot channel, so killing never contends with reaping.
//!
//! Leases are acquired while at least one session is live and the lease has
//! been requested, and released when the last session exits.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot};

use super::{
    LeaseKind, RegistryEvent, ResourceLeaseFlags, SessionCounts, SessionId, SessionKind,
    SessionRegistry, UiHandle,
};
use crate::env::{build_environment, AmbientEnv, ProcessEnv};
use crate::error::{HostError, Result};
use crate::paths::InstallLayout;

/// Options passed to the editor server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOptions {
    pub port: u16,
    pub listen_on_all_interfaces: bool,
    pub use_ssl: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            port: 13337,
            listen_on_all_interfaces: false,
            use_ssl: false,
        }
    }
}

/// Program, arguments and working directory of a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Builds launch specs and environments for each session kind
#[derive(Debug, Clone)]
pub struct SessionLauncher {
    layout: InstallLayout,
    os_level: u32,
    editor: EditorOptions,
}

impl SessionLauncher {
    pub fn new(layout: InstallLayout, os_level: u32, editor: EditorOptions) -> Self {
        Self {
            layout,
            os_level,
            editor,
        }
    }

    pub fn spec(&self, kind: SessionKind) -> LaunchSpec {
        match kind {
            SessionKind::Editor => {
                let host = if self.editor.listen_on_all_interfaces {
                    "0.0.0.0"
                } else {
                    "127.0.0.1"
                };
                let mut args = vec![
                    self.layout.boot_script().display().to_string(),
                    "--bind-addr".to_string(),
                    format!("{}:{}", host, self.editor.port),
                    "--auth".to_string(),
                    "none".to_string(),
                ];
                if self.editor.use_ssl {
                    args.push("--cert".to_string());
                }
                LaunchSpec {
                    program: self.layout.node_binary(),
                    args,
                    cwd: self.layout.home(),
                }
            }
            SessionKind::Terminal => LaunchSpec {
                program: self.layout.shell(),
                args: vec!["-l".to_string()],
                cwd: self.layout.home(),
            },
        }
    }

    /// Command ready to spawn, with the environment fully replaced
    pub fn command(&self, kind: SessionKind, ambient: &dyn AmbientEnv) -> Command {
        let spec = self.spec(kind);
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).current_dir(&spec.cwd).kill_on_drop(true);
        build_environment(&self.layout, self.os_level, ambient).apply_tokio(&mut command);
        command
    }
}

struct SessionEntry {
    kind: SessionKind,
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Registry that spawns and tracks real child processes
pub struct ProcessRegistry {
    this: Weak<ProcessRegistry>,
    launcher: SessionLauncher,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    /// Leases the user asked for
    requested: Mutex<ResourceLeaseFlags>,
    /// Leases actually held
    held: Mutex<ResourceLeaseFlags>,
    wants_to_stop: AtomicBool,
    attached: AtomicUsize,
    ui: RwLock<Option<Arc<dyn UiHandle>>>,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl ProcessRegistry {
    /// Monitors hold the registry, so it only exists behind an `Arc`
    pub fn new(launcher: SessionLauncher) -> Arc<Self> {
        // Create event broadcast channel (capacity 100 events)
        let (event_tx, _) = broadcast::channel(100);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            launcher,
            sessions: RwLock::new(HashMap::new()),
            requested: Mutex::new(ResourceLeaseFlags::default()),
            held: Mutex::new(ResourceLeaseFlags::default()),
            wants_to_stop: AtomicBool::new(false),
            attached: AtomicUsize::new(0),
            ui: RwLock::new(None),
            event_tx,
        })
    }

    /// Number of attached UIs
    pub fn attached_count(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    async fn monitor(self: Arc<Self>, id: SessionId, mut child: Child, kill_rx: oneshot::Receiver<()>) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                tracing::debug!("Kill requested for session {}", id);
                if let Err(e) = child.start_kill() {
                    tracing::warn!("Failed to signal session {}: {}", id, e);
                }
                child.wait().await
            }
        };

        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!("Failed to reap session {}: {}", id, e);
                None
            }
        };
        self.finish(&id, exit_code);
    }

    fn finish(&self, id: &SessionId, exit_code: Option<i32>) {
        let removed = self.sessions.write().remove(id);
        if let Some(entry) = removed {
            tracing::info!(
                "{} session {} exited with {:?}",
                entry.kind,
                id,
                exit_code
            );
            self.emit(RegistryEvent::SessionEnded {
                id: id.clone(),
                kind: entry.kind,
                exit_code,
            });
            self.sync_leases();
        }
    }

    /// Ask for (or give up) a lease. It is held only while sessions exist.
    pub fn request_lease(&self, kind: LeaseKind, wanted: bool) {
        self.requested.lock().set(kind, wanted);
        self.sync_leases();
    }

    /// Recompute held leases from requests and live sessions
    fn sync_leases(&self) {
        let live = !self.sessions.read().is_empty();
        let requested = *self.requested.lock();
        let changed = {
            let mut held = self.held.lock();
            let next = ResourceLeaseFlags {
                wake_lock: live && requested.wake_lock,
                wifi_lock: live && requested.wifi_lock,
            };
            if *held == next {
                None
            } else {
                for kind in [LeaseKind::WakeLock, LeaseKind::WifiLock] {
                    if held.get(kind) != next.get(kind) {
                        let action = if next.get(kind) { "Acquired" } else { "Released" };
                        tracing::info!("{} {:?}", action, kind);
                    }
                }
                *held = next;
                Some(next)
            }
        };
        if let Some(flags) = changed {
            self.emit(RegistryEvent::LeasesChanged(flags));
        }
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl SessionRegistry for ProcessRegistry {
    /// Must run inside a tokio runtime
    fn spawn_session(&self, kind: SessionKind) -> Result<SessionId> {
        if self.wants_to_stop() {
            return Err(HostError::Spawn {
                program: kind.to_string(),
                message: "service is stopping".to_string(),
            });
        }

        let registry = self.this.upgrade().ok_or_else(|| HostError::Spawn {
            program: kind.to_string(),
            message: "registry is shutting down".to_string(),
        })?;

        let mut command = self.launcher.command(kind, &ProcessEnv);
        let program = self.launcher.spec(kind).program.display().to_string();
        let child = command.spawn().map_err(|e| HostError::Spawn {
            program: program.clone(),
            message: e.to_string(),
        })?;

        let id = SessionId::new();
        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        self.sessions.write().insert(
            id.clone(),
            SessionEntry {
                kind,
                pid,
                kill_tx: Some(kill_tx),
            },
        );
        tracing::info!("Started {} session {} (pid {:?}): {}", kind, id, pid, program);
        self.emit(RegistryEvent::SessionStarted {
            id: id.clone(),
            kind,
        });
        self.sync_leases();

        let monitor_id = id.clone();
        tokio::spawn(async move {
            registry.monitor(monitor_id, child, kill_rx).await;
        });

        Ok(id)
    }

    fn counts(&self) -> SessionCounts {
        let sessions = self.sessions.read();
        let mut counts = SessionCounts::default();
        for entry in sessions.values() {
            match entry.kind {
                SessionKind::Editor => counts.editor += 1,
                SessionKind::Terminal => counts.terminal += 1,
            }
        }
        counts
    }

    fn leases(&self) -> ResourceLeaseFlags {
        *self.held.lock()
    }

    fn live_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    fn kill_session(&self, id: &SessionId) -> Result<()> {
        let (kill_tx, pid) = {
            let mut sessions = self.sessions.write();
            let entry = sessions.get_mut(id).ok_or_else(|| HostError::SessionTermination {
                session: id.to_string(),
                message: "no such session".to_string(),
            })?;
            (entry.kill_tx.take(), entry.pid)
        };
        let kill_tx = kill_tx.ok_or_else(|| HostError::SessionTermination {
            session: id.to_string(),
            message: "kill already requested".to_string(),
        })?;
        kill_tx.send(()).map_err(|_| HostError::SessionTermination {
            session: id.to_string(),
            message: format!("monitor for pid {:?} is gone", pid),
        })
    }

    fn set_wants_to_stop(&self, wants: bool) {
        self.wants_to_stop.store(wants, Ordering::SeqCst);
    }

    fn wants_to_stop(&self) -> bool {
        self.wants_to_stop.load(Ordering::SeqCst)
    }

    fn on_attach(&self) {
        self.attached.fetch_add(1, Ordering::SeqCst);
        self.emit(RegistryEvent::UiAttached);
    }

    fn on_detach(&self) {
        // Saturate at zero on unbalanced detaches
        let _ = self
            .attached
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.emit(RegistryEvent::UiDetached);
    }

    fn set_ui(&self, ui: Option<Arc<dyn UiHandle>>) {
        *self.ui.write() = ui;
    }

    fn ui(&self) -> Option<Arc<dyn UiHandle>> {
        self.ui.read().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }
}
