//! Wrapper around the Vercel CLI that pulls project environments without
//! getting in the way of CI.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (prompt key decoding and rendering, output
//!   capture, failure classification, config and team-list parsing). No I/O.
//! - **[`io`]**: Side effects (the shared stdin, terminal control, child
//!   processes, the Vercel runner). Trait seams let tests substitute fakes.
//!
//! [`pull`] coordinates both to link the project and pull its environments.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pull;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
