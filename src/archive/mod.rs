//! Bundled runtime installer
//!
//! Unpacks a gzip-compressed tar archive onto the private install root and
//! reports progress as it goes.
//!
//! # Example
//!
//! ```ignore
//! use codehost::archive::{spawn_install, FileSource, Installer};
//! use codehost::paths::InstallLayout;
//!
//! let installer = Installer::new(InstallLayout::new("/data/app"));
//! let (handle, mut progress) = spawn_install(installer, Box::new(FileSource::new("bundle.tgz")), 64);
//! while let Some(event) = progress.recv().await {
//!     println!("{}/{}", event.processed, event.total);
//! }
//! let report = handle.await??;
//! ```

pub mod extract;
pub mod install;
pub mod progress;
pub mod source;

pub use extract::{count_entries, extract, DeferredLink, EntryKind, ExtractSummary};
pub use install::{spawn_install, InstallReport, Installer};
pub use progress::{NullSink, ProgressEvent, ProgressSink};
pub use source::{ArchiveSource, BytesSource, FileSource};
