//! Deterministic, pure logic shared by the prompt engine and the runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (bytes, captured output, parsed JSON) and return deterministic
//! outputs suitable for tests.

pub mod classifier;
pub mod escape;
pub mod output;
pub mod project_config;
pub mod prompt;
pub mod teams;
pub mod types;
