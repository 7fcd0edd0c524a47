//! Test utilities and fixtures for tsjest
//!
//! This crate provides shared test helpers for the integration tests
//! (tests/ directory) of the other workspace crates.

pub mod fake_typescript;
pub mod fixtures;
pub mod mocks;
pub mod project;

pub use fake_typescript::{
    FakeStats, FakeTypeScript, CANNOT_FIND_NAME, MISSING_TOKEN, TYPE_NOT_ASSIGNABLE,
};
pub use mocks::{MockDiagnosticHandler, RecordingFallback};
pub use project::{TestProject, CACHE_DIR, PROJECT_ROOT};
