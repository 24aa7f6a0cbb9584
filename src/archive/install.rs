//! Full install of the bundled runtime
//!
//! Order of operations:
//! 1. refuse secondary profiles
//! 2. take the single-writer lock on the install root
//! 3. delete stale critical paths (editor dir, interpreter, C++ runtime)
//! 4. count entries and announce the total
//! 5. extract
//! 6. mark shell scripts under the editor dir and the interpreter executable
//!
//! Nothing is retried. An error leaves the root as it was at the moment of
//! failure; presenting it to the user is the caller's job.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use super::extract::{count_entries, extract, ExtractSummary};
use super::progress::{ProgressEvent, ProgressSink};
use super::source::ArchiveSource;
use crate::error::{HostError, Result};
use crate::fs_utils::{remove_path, set_executable, InstallLock};
use crate::paths::InstallLayout;
use crate::profile;

/// Outcome of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub root: PathBuf,
    pub summary: ExtractSummary,
    /// Files whose execute bits were fixed up after extraction
    pub made_executable: usize,
    #[serde(skip)]
    pub duration: Duration,
}

/// Installs an archive into an `InstallLayout`
#[derive(Debug, Clone)]
pub struct Installer {
    layout: InstallLayout,
    profile_serial: u64,
}

impl Installer {
    /// Installer for `layout`, running as the current profile
    pub fn new(layout: InstallLayout) -> Self {
        Self {
            layout,
            profile_serial: profile::current_profile_serial(),
        }
    }

    /// Override the detected profile serial
    pub fn with_profile_serial(mut self, serial: u64) -> Self {
        self.profile_serial = serial;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Run the whole install, reporting progress to `sink`
    pub fn install(
        &self,
        source: &dyn ArchiveSource,
        sink: &mut dyn ProgressSink,
    ) -> Result<InstallReport> {
        profile::ensure_primary(self.profile_serial)?;

        let lock_path = self.layout.install_lock();
        let _lock = InstallLock::try_acquire(&lock_path)
            .map_err(|e| HostError::write(&lock_path, e))?
            .ok_or_else(|| HostError::InstallInProgress {
                root: self.layout.root().to_path_buf(),
            })?;

        let started = Instant::now();
        tracing::info!(
            "Installing {} into {}",
            source.describe(),
            self.layout.root().display()
        );

        self.remove_stale()?;

        let total = count_entries(source.open()?)?;
        tracing::debug!("Archive holds {} entries", total);
        sink.emit(ProgressEvent::announce(total));

        let root = self.layout.root();
        std::fs::create_dir_all(root).map_err(|e| HostError::write(root, e))?;
        let summary = extract(source.open()?, root, total, sink)?;

        for dir in [self.layout.home(), self.layout.tmp()] {
            std::fs::create_dir_all(&dir).map_err(|e| HostError::write(&dir, e))?;
        }
        let made_executable = self.fix_permissions()?;

        let report = InstallReport {
            root: root.to_path_buf(),
            summary,
            made_executable,
            duration: started.elapsed(),
        };
        tracing::info!(
            "Install complete: {} entries ({} files, {} links) in {:.1}s",
            report.summary.entries,
            report.summary.files,
            report.summary.symlinks + report.summary.hard_links,
            report.duration.as_secs_f64()
        );
        Ok(report)
    }

    fn remove_stale(&self) -> Result<()> {
        for path in self.layout.stale_critical_paths() {
            if remove_path(&path).map_err(|e| HostError::write(&path, e))? {
                tracing::debug!("Removed stale {}", path.display());
            }
        }
        Ok(())
    }

    /// Shell scripts and the interpreter must be executable regardless of
    /// what modes the archive carried.
    fn fix_permissions(&self) -> Result<usize> {
        let mut count = 0;
        let editor_dir = self.layout.editor_dir();
        if editor_dir.is_dir() {
            for entry in WalkDir::new(&editor_dir) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!("Skipping during permission fixup: {}", e);
                        continue;
                    }
                };
                let is_script = entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(".sh");
                if is_script {
                    set_executable(entry.path()).map_err(|e| HostError::write(entry.path(), e))?;
                    count += 1;
                }
            }
        }

        let node = self.layout.node_binary();
        if node.is_file() {
            set_executable(&node).map_err(|e| HostError::write(&node, e))?;
            count += 1;
        }
        Ok(count)
    }
}

/// Run an install on tokio's blocking pool.
///
/// Progress arrives on the returned receiver through a channel of
/// `capacity` slots; the worker blocks while it is full.
pub fn spawn_install(
    installer: Installer,
    source: Box<dyn ArchiveSource>,
    capacity: usize,
) -> (JoinHandle<Result<InstallReport>>, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::task::spawn_blocking(move || {
        let mut tx = tx;
        installer.install(source.as_ref(), &mut tx)
    });
    (handle, rx)
}
