//! codehost: installs a bundled editor runtime and supervises its sessions
//!
//! The library has four parts:
//!
//! - [`archive`] unpacks a gzip-compressed tar archive onto a private root on
//!   a background worker, reporting `(processed, total)` progress
//! - [`env`] builds the exact environment children of that runtime see
//! - [`supervisor`] drives the service lifecycle, kills sessions on stop and
//!   keeps the [`status`] surface in sync with the [`session`] registry
//! - [`control`] carries stop / open / status commands over localhost TCP
//!
//! # Example
//!
//! ```ignore
//! use codehost::archive::{FileSource, Installer, NullSink};
//! use codehost::env::{build_environment, ProcessEnv};
//! use codehost::paths::InstallLayout;
//!
//! let layout = InstallLayout::new("/data/app");
//! let report = Installer::new(layout.clone())
//!     .install(&FileSource::new("bundle.tgz"), &mut NullSink)?;
//! println!("{} entries", report.summary.entries);
//!
//! for line in build_environment(&layout, 30, &ProcessEnv).to_strings() {
//!     println!("{}", line);
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod control;
pub mod env;
pub mod error;
pub mod fs_utils;
pub mod paths;
pub mod profile;
pub mod service;
pub mod session;
pub mod status;
pub mod supervisor;

// Re-export commonly used types
pub use archive::{
    spawn_install, ArchiveSource, BytesSource, FileSource, InstallReport, Installer,
    ProgressEvent, ProgressSink,
};
pub use cli::{Cli, Commands};
pub use config::HostConfig;
pub use env::{build_environment, AmbientEnv, ChildEnvironment, ProcessEnv};
pub use error::{HostError, Result};
pub use paths::InstallLayout;
pub use session::{
    ProcessRegistry, ResourceLeaseFlags, SessionCounts, SessionId, SessionKind, SessionRegistry,
    UiHandle,
};
pub use status::{StatusReporter, StatusSink, StatusSurface};
pub use supervisor::{Command, CommandOutcome, LifecycleState, StopReport, Supervisor};
