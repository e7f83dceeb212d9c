//! I/O adapters: shared standard input, terminal control, child processes
//! and configuration sources.

pub mod bin_path;
pub mod config;
pub mod confirm;
pub mod input;
pub mod process;
pub mod terminal;
pub mod vercel;
