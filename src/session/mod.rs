//! Live sessions and resource leases
//!
//! The registry owns everything about running sessions: the children
//! themselves, their counts, the resource leases held on their behalf, the
//! wants-to-stop flag and the back-reference to an attached UI. The
//! supervisor and status reporter only read snapshots and ask for kills.
//!
//! Every change to counts or leases is published as a [`RegistryEvent`] on a
//! broadcast channel so the status surface can be re-rendered.

pub mod process;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

pub use process::{EditorOptions, LaunchSpec, ProcessRegistry, SessionLauncher};

/// Kind of supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Editor,
    Terminal,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Editor => write!(f, "editor"),
            SessionKind::Terminal => write!(f, "terminal"),
        }
    }
}

/// Unique identifier of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of live session counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    pub terminal: usize,
    pub editor: usize,
}

impl SessionCounts {
    pub fn total(&self) -> usize {
        self.terminal + self.editor
    }
}

/// Exclusive system resource held while sessions need it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseKind {
    WakeLock,
    WifiLock,
}

/// Which leases are currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLeaseFlags {
    pub wake_lock: bool,
    pub wifi_lock: bool,
}

impl ResourceLeaseFlags {
    pub fn any(&self) -> bool {
        self.wake_lock || self.wifi_lock
    }

    pub fn get(&self, kind: LeaseKind) -> bool {
        match kind {
            LeaseKind::WakeLock => self.wake_lock,
            LeaseKind::WifiLock => self.wifi_lock,
        }
    }

    pub fn set(&mut self, kind: LeaseKind, held: bool) {
        match kind {
            LeaseKind::WakeLock => self.wake_lock = held,
            LeaseKind::WifiLock => self.wifi_lock = held,
        }
    }
}

/// Change published by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    SessionStarted { id: SessionId, kind: SessionKind },
    SessionEnded {
        id: SessionId,
        kind: SessionKind,
        exit_code: Option<i32>,
    },
    LeasesChanged(ResourceLeaseFlags),
    UiAttached,
    UiDetached,
}

impl RegistryEvent {
    /// Whether this event can change what the status surface shows
    pub fn affects_status(&self) -> bool {
        !matches!(self, RegistryEvent::UiAttached | RegistryEvent::UiDetached)
    }
}

/// The host UI as seen by the registry and supervisor
pub trait UiHandle: Send + Sync {
    /// Raise the UI to the foreground
    fn bring_to_front(&self);

    /// Show a message the user must dismiss; returns once dismissed
    fn show_blocking_error(&self, title: &str, message: &str);
}

/// Registry of live sessions, read by the supervisor
pub trait SessionRegistry: Send + Sync {
    /// Start a new session of `kind`; refused once the service wants to stop
    fn spawn_session(&self, kind: SessionKind) -> Result<SessionId>;

    fn counts(&self) -> SessionCounts;

    fn leases(&self) -> ResourceLeaseFlags;

    fn live_sessions(&self) -> Vec<SessionId>;

    /// Ask one session to terminate. May block; callers run it off the
    /// control path.
    fn kill_session(&self, id: &SessionId) -> Result<()>;

    fn set_wants_to_stop(&self, wants: bool);

    fn wants_to_stop(&self) -> bool;

    /// A UI attached to the service
    fn on_attach(&self);

    /// A UI detached from the service
    fn on_detach(&self);

    /// Replace the UI back-reference; `None` clears it
    fn set_ui(&self, ui: Option<Arc<dyn UiHandle>>);

    fn ui(&self) -> Option<Arc<dyn UiHandle>>;

    fn subscribe(&self) -> broadcast::Receiver<RegistryEvent>;
}
