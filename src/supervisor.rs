//! Service lifecycle supervisor
//!
//! An explicit, command-driven state machine:
//!
//! ```text
//! Starting ──(installed && first session live)──► Running
//!     │                                              │
//!     └────────────────(Command::Stop)───────────────┴──► StoppingRequested ──► Stopped
//! ```
//!
//! The supervisor is an owned handle; the service wraps it in an async mutex
//! so commands, attach/detach and registry events are handled one at a time.
//! Nothing here blocks on extraction: installs run on their own worker.
//!
//! Stopping kills every live session on its own blocking task, then waits for
//! the registry to drain. Both waits share one deadline, so a kill that hangs
//! cannot keep the service alive.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{timeout_at, Instant};

use crate::error::HostError;
use crate::session::{RegistryEvent, SessionId, SessionKind, SessionRegistry, UiHandle};
use crate::status::{StatusReporter, StatusSurface};

/// Lifecycle of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Running,
    StoppingRequested,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::StoppingRequested => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Out-of-band command delivered to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Terminate every session and stop the service
    Stop,
    /// Bring the host UI to the front
    Open,
    /// Start a new session
    Spawn(SessionKind),
}

impl FromStr for Command {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" | "stop_service" => Ok(Command::Stop),
            "open" => Ok(Command::Open),
            "terminal" | "new_terminal" => Ok(Command::Spawn(SessionKind::Terminal)),
            "editor" => Ok(Command::Spawn(SessionKind::Editor)),
            other => Err(HostError::Control {
                message: format!("Unknown command: {}", other),
            }),
        }
    }
}

/// What a stop achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    /// Kill attempts issued, one per live session
    pub attempted: usize,
    /// Kills that returned an error
    pub failed: usize,
    /// Kills still pending when the deadline passed
    pub unresolved: usize,
    /// Sessions or leases remained when the deadline passed
    pub timed_out: bool,
}

/// Result of handling one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Stopped(StopReport),
    Opened { ui_attached: bool },
    Spawned { kind: SessionKind, id: SessionId },
    /// The registry refused the command
    Rejected { message: String },
    /// The service already stopped; commands are ignored
    Ignored,
}

/// Drives the service lifecycle
pub struct Supervisor {
    registry: Arc<dyn SessionRegistry>,
    reporter: StatusReporter,
    state: LifecycleState,
    installed: bool,
    stop_timeout: Duration,
    last_stop: Option<StopReport>,
    shutdown_tx: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        reporter: StatusReporter,
        stop_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry,
            reporter,
            state: LifecycleState::Starting,
            installed: false,
            stop_timeout,
            last_stop: None,
            shutdown_tx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn status_visible(&self) -> bool {
        self.reporter.is_visible()
    }

    /// Report of the stop that ended the service, if it has stopped
    pub fn last_stop(&self) -> Option<StopReport> {
        self.last_stop
    }

    /// Flips to `true` once the service has stopped and the process should exit
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state == LifecycleState::Stopped || self.state == next {
            return;
        }
        tracing::info!("Service {} -> {}", self.state, next);
        self.state = next;
    }

    fn is_stopping(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::StoppingRequested | LifecycleState::Stopped
        )
    }

    /// Record that the runtime is installed
    pub fn mark_installed(&mut self) {
        self.installed = true;
        self.maybe_running();
    }

    fn maybe_running(&mut self) {
        if self.state == LifecycleState::Starting
            && self.installed
            && self.registry.counts().total() > 0
        {
            self.transition(LifecycleState::Running);
        }
    }

    /// A UI attached
    pub fn attach(&mut self, ui: Arc<dyn UiHandle>) {
        self.registry.on_attach();
        self.registry.set_ui(Some(ui));
    }

    /// The UI detached; its back-reference is dropped
    pub fn detach(&mut self) {
        self.registry.on_detach();
        self.registry.set_ui(None);
    }

    /// Start a session of `kind` through the registry
    pub fn spawn(&mut self, kind: SessionKind) -> crate::error::Result<SessionId> {
        let id = self.registry.spawn_session(kind)?;
        self.maybe_running();
        Ok(id)
    }

    /// React to a registry change
    pub fn on_registry_event(&mut self, event: &RegistryEvent) {
        if self.is_stopping() {
            return;
        }
        tracing::debug!("Registry event: {:?}", event);
        self.maybe_running();
        if event.affects_status() {
            self.rebuild_status();
        }
    }

    /// Re-post the status surface from the current registry snapshot.
    ///
    /// Does nothing once a stop has been requested, so the surface stays down.
    pub fn rebuild_status(&mut self) -> Option<StatusSurface> {
        if self.is_stopping() {
            return None;
        }
        let counts = self.registry.counts();
        let leases = self.registry.leases();
        Some(self.reporter.rebuild(counts, leases))
    }

    /// Current status record without posting it
    pub fn status_snapshot(&self) -> StatusSurface {
        StatusSurface::build(self.registry.counts(), self.registry.leases())
    }

    /// Handle an out-of-band command
    pub async fn handle_command(&mut self, command: Command) -> CommandOutcome {
        if self.state == LifecycleState::Stopped {
            tracing::debug!("Ignoring {:?}: service already stopped", command);
            return CommandOutcome::Ignored;
        }
        match command {
            Command::Stop => CommandOutcome::Stopped(self.stop().await),
            Command::Open => {
                let ui = self.registry.ui();
                if let Some(ui) = &ui {
                    ui.bring_to_front();
                } else {
                    tracing::debug!("Open requested with no UI attached");
                }
                CommandOutcome::Opened {
                    ui_attached: ui.is_some(),
                }
            }
            Command::Spawn(kind) => match self.spawn(kind) {
                Ok(id) => CommandOutcome::Spawned { kind, id },
                Err(e) => {
                    tracing::warn!("{}", e);
                    CommandOutcome::Rejected {
                        message: e.to_string(),
                    }
                }
            },
        }
    }

    async fn stop(&mut self) -> StopReport {
        self.transition(LifecycleState::StoppingRequested);
        self.registry.set_wants_to_stop(true);

        let deadline = Instant::now() + self.stop_timeout;
        let mut events = self.registry.subscribe();
        let sessions = self.registry.live_sessions();
        let mut report = StopReport {
            attempted: sessions.len(),
            ..StopReport::default()
        };
        tracing::info!("Stopping: killing {} session(s)", report.attempted);

        let mut kills = JoinSet::new();
        for id in sessions {
            let registry = Arc::clone(&self.registry);
            kills.spawn_blocking(move || registry.kill_session(&id));
        }

        let mut pending = report.attempted;
        loop {
            match timeout_at(deadline, kills.join_next()).await {
                Ok(Some(Ok(Ok(())))) => pending -= 1,
                Ok(Some(Ok(Err(e)))) => {
                    pending -= 1;
                    report.failed += 1;
                    tracing::warn!("{}", e);
                }
                Ok(Some(Err(e))) => {
                    pending -= 1;
                    report.failed += 1;
                    tracing::warn!("Kill task failed: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!("{} kill(s) still pending at the stop deadline", pending);
                    break;
                }
            }
        }
        // Hung kills keep running on their threads; nobody waits for them
        kills.detach_all();
        report.unresolved = pending;

        report.timed_out = !self.wait_for_drain(&mut events, deadline).await;
        if report.timed_out {
            let counts = self.registry.counts();
            tracing::warn!(
                "Stop deadline passed with {} session(s) live, leases {:?}",
                counts.total(),
                self.registry.leases()
            );
        }

        self.reporter.withdraw();
        self.transition(LifecycleState::Stopped);
        self.last_stop = Some(report);
        self.shutdown_tx.send_replace(true);
        report
    }

    /// Wait until the registry has no sessions and holds no leases
    async fn wait_for_drain(
        &self,
        events: &mut broadcast::Receiver<RegistryEvent>,
        deadline: Instant,
    ) -> bool {
        loop {
            if self.drained() {
                return true;
            }
            match timeout_at(deadline, events.recv()).await {
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Err(RecvError::Closed)) => return self.drained(),
                Err(_) => return self.drained(),
            }
        }
    }

    fn drained(&self) -> bool {
        self.registry.counts().total() == 0 && !self.registry.leases().any()
    }
}

/// Feed registry events into the supervisor until the service stops
pub fn spawn_event_pump(
    supervisor: Arc<Mutex<Supervisor>>,
    mut events: broadcast::Receiver<RegistryEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let mut supervisor = supervisor.lock().await;
                    supervisor.on_registry_event(&event);
                    if supervisor.state() == LifecycleState::Stopped {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event pump lagged by {} events, resyncing", skipped);
                    supervisor.lock().await.rebuild_status();
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!("stop_service".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("stop".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("open".parse::<Command>().unwrap(), Command::Open);
        assert_eq!(
            "terminal".parse::<Command>().unwrap(),
            Command::Spawn(SessionKind::Terminal)
        );
        assert!("restart".parse::<Command>().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::StoppingRequested.to_string(), "stopping");
    }
}
