//! Scriptable in-memory session registry
//!
//! Sessions are plain ids. A kill removes the session (and, with the last
//! one, every lease) unless its `KillBehavior` says otherwise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use codehost::session::{
    RegistryEvent, ResourceLeaseFlags, SessionCounts, SessionId, SessionKind, SessionRegistry,
    UiHandle,
};
use codehost::{HostError, Result};

/// What happens when a session is killed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillBehavior {
    /// Session ends right away
    Dies,
    /// Kill returns an error and the session keeps running
    Fails,
    /// Kill blocks for the duration, then the session ends
    Hangs(Duration),
    /// Kill succeeds but the session never exits
    Ignores,
}

pub struct FakeRegistry {
    sessions: RwLock<HashMap<SessionId, (SessionKind, KillBehavior)>>,
    leases: Mutex<ResourceLeaseFlags>,
    wants_to_stop: AtomicBool,
    attached: AtomicUsize,
    detached: AtomicUsize,
    kills: AtomicUsize,
    ui: RwLock<Option<Arc<dyn UiHandle>>>,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            leases: Mutex::new(ResourceLeaseFlags::default()),
            wants_to_stop: AtomicBool::new(false),
            attached: AtomicUsize::new(0),
            detached: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
            ui: RwLock::new(None),
            event_tx,
        })
    }

    /// Add a live session
    pub fn add(&self, kind: SessionKind, behavior: KillBehavior) -> SessionId {
        let id = SessionId::new();
        self.sessions.write().insert(id.clone(), (kind, behavior));
        let _ = self.event_tx.send(RegistryEvent::SessionStarted {
            id: id.clone(),
            kind,
        });
        id
    }

    /// Hold leases
    pub fn hold(&self, leases: ResourceLeaseFlags) {
        *self.leases.lock() = leases;
        let _ = self.event_tx.send(RegistryEvent::LeasesChanged(leases));
    }

    pub fn kill_calls(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }

    fn end(&self, id: &SessionId) {
        let removed = self.sessions.write().remove(id);
        if let Some((kind, _)) = removed {
            let _ = self.event_tx.send(RegistryEvent::SessionEnded {
                id: id.clone(),
                kind,
                exit_code: None,
            });
        }
        if self.sessions.read().is_empty() {
            let mut leases = self.leases.lock();
            if leases.any() {
                *leases = ResourceLeaseFlags::default();
                let _ = self.event_tx.send(RegistryEvent::LeasesChanged(*leases));
            }
        }
    }
}

impl SessionRegistry for FakeRegistry {
    fn spawn_session(&self, kind: SessionKind) -> Result<SessionId> {
        if self.wants_to_stop() {
            return Err(HostError::Spawn {
                program: kind.to_string(),
                message: "service is stopping".to_string(),
            });
        }
        Ok(self.add(kind, KillBehavior::Dies))
    }

    fn counts(&self) -> SessionCounts {
        let mut counts = SessionCounts::default();
        for (kind, _) in self.sessions.read().values() {
            match kind {
                SessionKind::Editor => counts.editor += 1,
                SessionKind::Terminal => counts.terminal += 1,
            }
        }
        counts
    }

    fn leases(&self) -> ResourceLeaseFlags {
        *self.leases.lock()
    }

    fn live_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    fn kill_session(&self, id: &SessionId) -> Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        let behavior = self.sessions.read().get(id).map(|(_, behavior)| *behavior);
        match behavior {
            None => Err(HostError::SessionTermination {
                session: id.to_string(),
                message: "no such session".to_string(),
            }),
            Some(KillBehavior::Dies) => {
                self.end(id);
                Ok(())
            }
            Some(KillBehavior::Fails) => Err(HostError::SessionTermination {
                session: id.to_string(),
                message: "permission denied".to_string(),
            }),
            Some(KillBehavior::Hangs(duration)) => {
                std::thread::sleep(duration);
                self.end(id);
                Ok(())
            }
            Some(KillBehavior::Ignores) => Ok(()),
        }
    }

    fn set_wants_to_stop(&self, wants: bool) {
        self.wants_to_stop.store(wants, Ordering::SeqCst);
    }

    fn wants_to_stop(&self) -> bool {
        self.wants_to_stop.load(Ordering::SeqCst)
    }

    fn on_attach(&self) {
        self.attached.fetch_add(1, Ordering::SeqCst);
        let _ = self.event_tx.send(RegistryEvent::UiAttached);
    }

    fn on_detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
        let _ = self.event_tx.send(RegistryEvent::UiDetached);
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

/// UI handle that counts raises and records blocking errors
#[derive(Default)]
pub struct RecordingUi {
    raised: AtomicUsize,
    errors: Mutex<Vec<(String, String)>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raised(&self) -> usize {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().clone()
    }
}

impl UiHandle for RecordingUi {
    fn bring_to_front(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
    }

    fn show_blocking_error(&self, title: &str, message: &str) {
        self.errors
            .lock()
            .push((title.to_string(), message.to_string()));
    }
}
