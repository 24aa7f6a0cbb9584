//! Two-pass tar extraction
//!
//! `count_entries` walks the headers once without touching the disk so the
//! total can be announced. `extract` then decodes the stream again and
//! materializes entries in archive order:
//!
//! - directories and parents are created idempotently
//! - symlinks are created immediately with their link text verbatim
//! - hard links are deferred until the stream is consumed, because tar gives no
//!   guarantee that a link's source comes first, and then resolved as a
//!   content copy of the source (real hard links are not portable to every
//!   target filesystem)
//! - everything else is streamed to a regular file in fixed-size chunks
//!
//! Any I/O failure aborts the whole extraction. Partially written files are
//! left in place; the caller removes stale critical paths before extracting.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::{debug, trace};

use super::progress::{ProgressEvent, ProgressSink};
use crate::error::{HostError, Result};

const COPY_CHUNK: usize = 8 * 1024;

/// How an archive record is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    HardLink,
}

impl EntryKind {
    /// Classify a tar record. `None` for metadata records (long names, PAX
    /// headers) that describe other entries and are never counted.
    ///
    /// Devices, FIFOs and unknown kinds fall back to `File`: their payload,
    /// usually empty, is written as a regular file.
    pub fn classify(entry_type: tar::EntryType) -> Option<Self> {
        use tar::EntryType;
        match entry_type {
            EntryType::Directory => Some(Self::Directory),
            EntryType::Symlink => Some(Self::Symlink),
            EntryType::Link => Some(Self::HardLink),
            EntryType::XGlobalHeader
            | EntryType::XHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink => None,
            _ => Some(Self::File),
        }
    }
}

/// A hard link waiting for its source to be extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredLink {
    pub source: PathBuf,
    pub link: PathBuf,
}

/// What an extraction produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub entries: usize,
    pub directories: usize,
    pub files: usize,
    pub symlinks: usize,
    pub hard_links: usize,
    pub bytes_written: u64,
}

/// Count the entries of a gzip tar stream without writing anything.
///
/// Payloads are skipped by the decoder; only headers are inspected.
pub fn count_entries<R: Read>(reader: R) -> Result<usize> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut total = 0;
    for entry in archive.entries().map_err(HostError::archive)? {
        let entry = entry.map_err(HostError::archive)?;
        if EntryKind::classify(entry.header().entry_type()).is_some() {
            total += 1;
        }
    }
    Ok(total)
}

/// Extract a gzip tar stream into `dest_root`.
///
/// Emits one `ProgressEvent(i, total)` per entry before the entry's payload is
/// consumed, so progress counts entries started. `total` comes from a prior
/// `count_entries` over the same archive.
pub fn extract<R: Read>(
    reader: R,
    dest_root: &Path,
    total: usize,
    sink: &mut dyn ProgressSink,
) -> Result<ExtractSummary> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut summary = ExtractSummary::default();
    let mut deferred: Vec<DeferredLink> = Vec::new();

    for entry in archive.entries().map_err(HostError::archive)? {
        let mut entry = entry.map_err(HostError::archive)?;
        let Some(kind) = EntryKind::classify(entry.header().entry_type()) else {
            continue;
        };

        summary.entries += 1;
        sink.emit(ProgressEvent::new(summary.entries, total));

        let rel = entry.path().map_err(HostError::archive)?.into_owned();
        let dest = dest_root.join(checked_relative(&rel)?);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| HostError::write(parent, e))?;
        }

        match kind {
            EntryKind::Directory => {
                fs::create_dir_all(&dest).map_err(|e| HostError::write(&dest, e))?;
                summary.directories += 1;
            }
            EntryKind::Symlink => {
                let target = link_target(&entry, &rel)?;
                trace!("symlink {} -> {}", dest.display(), target.display());
                create_symlink(&target, &dest)?;
                summary.symlinks += 1;
            }
            EntryKind::HardLink => {
                let target = link_target(&entry, &rel)?;
                let source = dest_root.join(checked_relative(&target)?);
                deferred.push(DeferredLink { source, link: dest });
            }
            EntryKind::File => {
                let mode = entry.header().mode().ok();
                summary.bytes_written += write_file(&mut entry, &dest, mode)?;
                summary.files += 1;
            }
        }
    }

    for link in &deferred {
        debug!("link {} >> {}", link.source.display(), link.link.display());
        resolve_link(link)?;
        summary.hard_links += 1;
    }

    Ok(summary)
}

/// Reject absolute paths and `..` so no entry lands outside the root
fn checked_relative(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(HostError::ArchiveRead {
                    message: format!("entry escapes install root: {}", path.display()),
                });
            }
        }
    }
    Ok(out)
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, rel: &Path) -> Result<PathBuf> {
    entry
        .link_name()
        .map_err(HostError::archive)?
        .map(|target| target.into_owned())
        .ok_or_else(|| HostError::ArchiveRead {
            message: format!("link entry without target: {}", rel.display()),
        })
}

/// Drop a previous non-directory at `path` so a re-install overwrites in place
fn clear_non_dir(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => {
            fs::remove_file(path).map_err(|e| HostError::write(path, e))
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HostError::write(path, e)),
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, dest: &Path) -> Result<()> {
    clear_non_dir(dest)?;
    std::os::unix::fs::symlink(target, dest).map_err(|e| HostError::write(dest, e))
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, dest: &Path) -> Result<()> {
    Err(HostError::write(dest, "symbolic links are only supported on unix"))
}

fn write_file<R: Read>(payload: &mut R, dest: &Path, mode: Option<u32>) -> Result<u64> {
    // Unlink first: an older copy may be a symlink or read-only
    clear_non_dir(dest)?;

    let mut out = File::create(dest).map_err(|e| HostError::write(dest, e))?;
    let mut buf = [0u8; COPY_CHUNK];
    let mut written = 0u64;
    loop {
        let n = match payload.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HostError::archive(e)),
        };
        out.write_all(&buf[..n])
            .map_err(|e| HostError::write(dest, e))?;
        written += n as u64;
    }
    out.flush().map_err(|e| HostError::write(dest, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            fs::set_permissions(dest, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| HostError::write(dest, e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(written)
}

fn resolve_link(link: &DeferredLink) -> Result<()> {
    clear_non_dir(&link.link)?;
    fs::copy(&link.source, &link.link).map_err(|e| HostError::FilesystemWrite {
        path: link.link.clone(),
        message: format!("copy from {}: {}", link.source.display(), e),
    })?;
    Ok(())
}
