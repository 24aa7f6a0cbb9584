//! Fixed filesystem layout of the private runtime
//!
//! Every path the runtime uses is derived from one base root. The archive is
//! extracted into `<base>/files`; HOME and TMP live below that install root,
//! so moving the base moves everything together.
//!
//! ```text
//! <base>/
//! ├── .install.lock          single-writer guard for extraction
//! └── files/                 install root, PREFIX
//!     ├── .vsboot.js         boot script marker
//!     ├── node               editor server interpreter
//!     ├── code-server/       editor server
//!     ├── globalinject.js    interpreter preload module
//!     ├── home/              HOME
//!     ├── tmp/               TMPDIR
//!     └── usr/{bin,lib}
//! ```

use std::path::{Path, PathBuf};

/// Name of the install root below the base root
pub const FILES_DIR: &str = "files";
/// Boot script marker, present once an install has completed
pub const BOOT_SCRIPT: &str = ".vsboot.js";
/// Editor server directory, wiped before every install
pub const EDITOR_DIR: &str = "code-server";
/// Interpreter binary used to run the editor server
pub const NODE_BINARY: &str = "node";
/// Bundled C++ runtime, wiped before every install
pub const LIBCXX_SHARED: &str = "libc_android24++_shared.so";
/// Module the interpreter preloads in every child
pub const PRELOAD_MODULE: &str = "globalinject.js";
/// Syscall compatibility shim for old platforms
pub const LEGACY_SHIM: &str = "android_23.so";
const LOCK_FILE: &str = ".install.lock";

/// All paths of the private runtime, derived from one base root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    base: PathBuf,
    root: PathBuf,
}

impl InstallLayout {
    /// Derive the layout from a base root
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let root = base.join(FILES_DIR);
        Self { base, root }
    }

    /// Default base root: `<data_local_dir>/codehost`, or the temp dir as last resort
    pub fn default_base() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("codehost"))
            .unwrap_or_else(|| std::env::temp_dir().join("codehost"))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Install root; also PREFIX for spawned children
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn home(&self) -> PathBuf {
        self.root.join("home")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn boot_script(&self) -> PathBuf {
        self.root.join(BOOT_SCRIPT)
    }

    pub fn editor_dir(&self) -> PathBuf {
        self.root.join(EDITOR_DIR)
    }

    pub fn node_binary(&self) -> PathBuf {
        self.root.join(NODE_BINARY)
    }

    pub fn shell(&self) -> PathBuf {
        self.root.join("usr/bin/bash")
    }

    pub fn preload_module(&self) -> PathBuf {
        self.root.join(PRELOAD_MODULE)
    }

    pub fn legacy_shim(&self) -> PathBuf {
        self.root.join(LEGACY_SHIM)
    }

    /// Executable search path entries, in lookup order
    pub fn bin_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.root.join("bin"),
            self.root.join("usr/bin"),
            self.root.join("usr/bin/applets"),
        ]
    }

    /// Shared library search path entries, in lookup order
    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        vec![self.root.clone(), self.root.join("usr/lib")]
    }

    /// Lock file guarding the install root against concurrent extraction
    pub fn install_lock(&self) -> PathBuf {
        self.base.join(LOCK_FILE)
    }

    /// Paths removed before extraction so a stale copy never survives an upgrade
    pub fn stale_critical_paths(&self) -> Vec<PathBuf> {
        vec![
            self.editor_dir(),
            self.root.join(LIBCXX_SHARED),
            self.node_binary(),
        ]
    }

    /// Whether a completed install is present
    pub fn is_installed(&self) -> bool {
        self.boot_script().is_file()
    }
}

/// Join path entries with `:` for search path variables.
pub fn join_search_path(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}
