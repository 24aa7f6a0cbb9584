//! Common test utilities and fixtures for codehost integration tests
//!
//! This module provides:
//! - `TestArchive` builder for gzip tar fixtures
//! - `FakeRegistry`, a scriptable in-memory session registry
//! - `RecordingUi`, a UI handle that remembers what was asked of it

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fake_registry;
pub mod test_archive;

pub use fake_registry::{FakeRegistry, KillBehavior, RecordingUi};
pub use test_archive::TestArchive;
