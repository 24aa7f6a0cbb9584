//! The persistent status surface
//!
//! One record, always posted under [`STATUS_ID`], summarizing live session
//! counts and held leases, with a stop control and an open-UI control.
//! Posting again replaces the record. Failures to post or withdraw are logged
//! and swallowed: sessions keep running whatever happens to the surface.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{HostError, Result};
use crate::fs_utils;
use crate::session::{ResourceLeaseFlags, SessionCounts};
use crate::supervisor::Command;

/// Fixed identifier of the status record
pub const STATUS_ID: u32 = 1;

pub const WAKE_LOCK_SUFFIX: &str = "with wake-lock";
pub const WIFI_LOCK_SUFFIX: &str = "with wifi-lock";

/// A control shown on the status surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusControl {
    pub label: String,
    pub command: Command,
}

/// The rendered status record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSurface {
    pub id: u32,
    pub title: String,
    pub ongoing: bool,
    pub counts: SessionCounts,
    pub leases: ResourceLeaseFlags,
    /// Control fired when the surface itself is activated
    pub open: StatusControl,
    pub actions: Vec<StatusControl>,
}

impl StatusSurface {
    pub fn build(counts: SessionCounts, leases: ResourceLeaseFlags) -> Self {
        Self {
            id: STATUS_ID,
            title: status_title(counts, leases),
            ongoing: true,
            counts,
            leases,
            open: StatusControl {
                label: "Open".to_string(),
                command: Command::Open,
            },
            actions: vec![StatusControl {
                label: "Stop server".to_string(),
                command: Command::Stop,
            }],
        }
    }
}

/// Title line: both session counts plus one suffix per held lease
pub fn status_title(counts: SessionCounts, leases: ResourceLeaseFlags) -> String {
    let mut suffixes = Vec::new();
    if leases.wake_lock {
        suffixes.push(WAKE_LOCK_SUFFIX);
    }
    if leases.wifi_lock {
        suffixes.push(WIFI_LOCK_SUFFIX);
    }
    let ext = if suffixes.is_empty() {
        String::new()
    } else {
        format!(", {}", suffixes.join(", "))
    };
    format!(
        "Editor host is running, {} terminal, {} editor session(s){}.",
        counts.terminal, counts.editor, ext
    )
}

/// Where the status surface is published
pub trait StatusSink: Send + Sync {
    /// Post or replace the record with `surface.id`
    fn post(&self, surface: &StatusSurface) -> Result<()>;

    /// Remove the record with `id`
    fn withdraw(&self, id: u32) -> Result<()>;
}

/// Keeps the record as a JSON file the UI layer can watch
#[derive(Debug, Clone)]
pub struct FileStatusSink {
    path: PathBuf,
}

impl FileStatusSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl StatusSink for FileStatusSink {
    fn post(&self, surface: &StatusSurface) -> Result<()> {
        tracing::info!("[status {}] {}", surface.id, surface.title);
        let payload = serde_json::json!({
            "surface": surface,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });
        let bytes = serde_json::to_vec_pretty(&payload).map_err(|e| HostError::StatusSurface {
            message: format!("Failed to serialize status: {}", e),
        })?;
        fs_utils::atomic_write(&self.path, &bytes).map_err(|e| HostError::StatusSurface {
            message: format!("{}: {}", self.path.display(), e),
        })
    }

    fn withdraw(&self, id: u32) -> Result<()> {
        tracing::info!("[status {}] withdrawn", id);
        fs_utils::remove_path(&self.path)
            .map(|_| ())
            .map_err(|e| HostError::StatusSurface {
                message: format!("{}: {}", self.path.display(), e),
            })
    }
}

/// Holds the latest record in memory
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    current: Mutex<Option<StatusSurface>>,
    posts: Mutex<usize>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<StatusSurface> {
        self.current.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        *self.posts.lock()
    }
}

impl StatusSink for MemoryStatusSink {
    fn post(&self, surface: &StatusSurface) -> Result<()> {
        *self.current.lock() = Some(surface.clone());
        *self.posts.lock() += 1;
        Ok(())
    }

    fn withdraw(&self, id: u32) -> Result<()> {
        let mut current = self.current.lock();
        if current.as_ref().map(|s| s.id) == Some(id) {
            *current = None;
        }
        Ok(())
    }
}

/// Renders the status surface into a sink and tracks its visibility
pub struct StatusReporter {
    sink: Arc<dyn StatusSink>,
    visible: bool,
}

impl StatusReporter {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            visible: false,
        }
    }

    /// Rebuild and re-post the record. Errors are logged, never returned.
    pub fn rebuild(&mut self, counts: SessionCounts, leases: ResourceLeaseFlags) -> StatusSurface {
        let surface = StatusSurface::build(counts, leases);
        match self.sink.post(&surface) {
            Ok(()) => self.visible = true,
            Err(e) => tracing::warn!("Failed to post status surface: {}", e),
        }
        surface
    }

    /// Take the record down. Errors are logged, never returned.
    pub fn withdraw(&mut self) {
        if let Err(e) = self.sink.withdraw(STATUS_ID) {
            tracing::warn!("Failed to withdraw status surface: {}", e);
        }
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl StatusSink for FailingSink {
        fn post(&self, _surface: &StatusSurface) -> Result<()> {
            Err(HostError::StatusSurface {
                message: "no notification channel".to_string(),
            })
        }

        fn withdraw(&self, _id: u32) -> Result<()> {
            Err(HostError::StatusSurface {
                message: "no notification channel".to_string(),
            })
        }
    }

    #[test]
    fn test_title_with_wake_lock_only() {
        let title = status_title(
            SessionCounts {
                terminal: 1,
                editor: 2,
            },
            ResourceLeaseFlags {
                wake_lock: true,
                wifi_lock: false,
            },
        );
        assert!(title.contains('2'));
        assert!(title.contains('1'));
        assert!(title.contains(WAKE_LOCK_SUFFIX));
        assert!(!title.contains(WIFI_LOCK_SUFFIX));
        assert_eq!(
            title,
            "Editor host is running, 1 terminal, 2 editor session(s), with wake-lock."
        );
    }

    #[test]
    fn test_title_with_both_leases() {
        let title = status_title(
            SessionCounts::default(),
            ResourceLeaseFlags {
                wake_lock: true,
                wifi_lock: true,
            },
        );
        assert!(title.ends_with(", with wake-lock, with wifi-lock."));
    }

    #[test]
    fn test_surface_controls() {
        let surface = StatusSurface::build(SessionCounts::default(), ResourceLeaseFlags::default());
        assert_eq!(surface.id, STATUS_ID);
        assert!(surface.ongoing);
        assert_eq!(surface.open.command, Command::Open);
        assert_eq!(surface.actions.len(), 1);
        assert_eq!(surface.actions[0].command, Command::Stop);
    }

    #[test]
    fn test_rebuild_replaces_instead_of_duplicating() {
        let sink = Arc::new(MemoryStatusSink::new());
        let mut reporter = StatusReporter::new(sink.clone());

        reporter.rebuild(SessionCounts { terminal: 0, editor: 1 }, ResourceLeaseFlags::default());
        reporter.rebuild(SessionCounts { terminal: 3, editor: 1 }, ResourceLeaseFlags::default());

        assert_eq!(sink.post_count(), 2);
        let current = sink.current().unwrap();
        assert_eq!(current.id, STATUS_ID);
        assert_eq!(current.counts.terminal, 3);
    }

    #[test]
    fn test_sink_failures_are_swallowed() {
        let mut reporter = StatusReporter::new(Arc::new(FailingSink));
        let surface = reporter.rebuild(SessionCounts::default(), ResourceLeaseFlags::default());
        assert_eq!(surface.id, STATUS_ID);
        assert!(!reporter.is_visible());
        reporter.withdraw();
        assert!(!reporter.is_visible());
    }

    #[test]
    fn test_file_sink_writes_and_withdraws() {
        let temp = tempfile::tempdir().unwrap();
        let sink = FileStatusSink::new(temp.path().join("tmp/status.json"));
        let surface = StatusSurface::build(
            SessionCounts { terminal: 1, editor: 1 },
            ResourceLeaseFlags::default(),
        );

        sink.post(&surface).unwrap();
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(sink.path()).unwrap()).unwrap();
        assert_eq!(written["surface"]["id"], 1);
        assert_eq!(written["surface"]["title"], surface.title.as_str());

        sink.withdraw(STATUS_ID).unwrap();
        assert!(!sink.path().exists());
    }
}
