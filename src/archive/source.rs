//! Replayable archive sources
//!
//! Counting and extracting are two separate decodes of the same stream, so a
//! source has to be openable from its start more than once.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{HostError, Result};

/// A gzip tar stream that can be reopened from the beginning
pub trait ArchiveSource: Send + Sync {
    /// Open a fresh reader positioned at the first byte
    fn open(&self) -> Result<Box<dyn Read + Send + '_>>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Archive held in memory, e.g. a bundle embedded in the binary
#[derive(Debug, Clone)]
pub struct BytesSource {
    bytes: Arc<[u8]>,
}

impl BytesSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ArchiveSource for BytesSource {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(&self.bytes[..])))
    }

    fn describe(&self) -> String {
        format!("in-memory bundle ({} bytes)", self.bytes.len())
    }
}

/// Archive on disk, reopened for each pass
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArchiveSource for FileSource {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        let file = File::open(&self.path).map_err(|e| HostError::ArchiveRead {
            message: format!("{}: {}", self.path.display(), e),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_source_replays_from_start() {
        let source = BytesSource::new(b"abcdef".to_vec());
        for _ in 0..2 {
            let mut out = String::new();
            source.open().unwrap().read_to_string(&mut out).unwrap();
            assert_eq!(out, "abcdef");
        }
    }

    #[test]
    fn test_missing_file_is_archive_read_error() {
        let source = FileSource::new("/definitely/not/here.tar.gz");
        let err = source.open().err().unwrap();
        assert!(matches!(err, HostError::ArchiveRead { .. }));
    }
}
