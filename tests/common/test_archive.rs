//! Builder for gzip-compressed tar fixtures
//!
//! Entries are written in exactly the order they are added, so tests can put
//! a hard link ahead of its source.

use std::fs;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use tempfile::TempDir;

/// Builder for a gzip tar archive held in memory
pub struct TestArchive {
    builder: Builder<GzEncoder<Vec<u8>>>,
    entries: usize,
}

impl TestArchive {
    /// Create a new empty archive
    pub fn new() -> Self {
        Self {
            builder: Builder::new(GzEncoder::new(Vec::new(), Compression::default())),
            entries: 0,
        }
    }

    /// Add a directory entry
    pub fn dir(mut self, path: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .expect("Failed to append directory");
        self.entries += 1;
        self
    }

    /// Add a regular file with mode 0644
    pub fn file(self, path: &str, content: &[u8]) -> Self {
        self.file_with_mode(path, content, 0o644)
    }

    /// Add a regular file with an explicit mode
    pub fn file_with_mode(mut self, path: &str, content: &[u8], mode: u32) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(mode);
        header.set_size(content.len() as u64);
        self.builder
            .append_data(&mut header, path, content)
            .expect("Failed to append file");
        self.entries += 1;
        self
    }

    /// Add a symlink whose link text is `target`, verbatim
    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_mode(0o777);
        header.set_size(0);
        self.builder
            .append_link(&mut header, path, target)
            .expect("Failed to append symlink");
        self.entries += 1;
        self
    }

    /// Add a hard link at `path` to the archive member `source`
    pub fn hard_link(mut self, path: &str, source: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Link);
        header.set_mode(0o644);
        header.set_size(0);
        self.builder
            .append_link(&mut header, path, source)
            .expect("Failed to append hard link");
        self.entries += 1;
        self
    }

    /// Add a FIFO record; it carries no payload
    pub fn fifo(mut self, path: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Fifo);
        header.set_mode(0o644);
        header.set_size(0);
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .expect("Failed to append fifo");
        self.entries += 1;
        self
    }

    /// Add a file whose raw header name is written as-is, bypassing the
    /// path checks of the tar builder
    pub fn raw_file(mut self, name: &str, content: &[u8]) -> Self {
        let mut header = Header::new_old();
        let bytes = name.as_bytes();
        header.as_old_mut().name[..bytes.len()].copy_from_slice(bytes);
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(content.len() as u64);
        header.set_cksum();
        self.builder
            .append(&header, content)
            .expect("Failed to append raw entry");
        self.entries += 1;
        self
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Finish the archive and return the gzip bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.builder
            .into_inner()
            .expect("Failed to finish tar stream")
            .finish()
            .expect("Failed to finish gzip stream")
    }

    /// Finish the archive and write it to `dir/name`
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.into_bytes()).expect("Failed to write archive");
        path
    }

    /// A small runtime bundle with every entry kind the installer handles.
    ///
    /// The hard link `usr/bin/node-hl` comes before its source `node`.
    pub fn runtime_bundle() -> Self {
        Self::new()
            .dir("usr/")
            .dir("usr/bin/")
            .dir("usr/lib/")
            .hard_link("usr/bin/node-hl", "node")
            .file_with_mode("node", b"#!/bin/sh\necho node\n", 0o644)
            .file_with_mode("usr/bin/bash", b"#!/bin/sh\nexec /bin/sh \"$@\"\n", 0o755)
            .symlink("usr/bin/sh", "bash")
            .symlink("usr/lib/libc++_shared.so", "../../libc_android24++_shared.so")
            .file("libc_android24++_shared.so", b"\x7fELF fake")
            .dir("code-server/")
            .dir("code-server/bin/")
            .file("code-server/bin/code-server.sh", b"#!/bin/sh\n")
            .file("code-server/package.json", br#"{"name":"code-server"}"#)
            .file(".vsboot.js", b"require('./code-server/out/node/entry')\n")
            .file("globalinject.js", b"// preload\n")
    }
}

impl Default for TestArchive {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh temporary base directory
pub fn temp_base() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}
