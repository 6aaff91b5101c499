//! tvm command layer
//!
//! Parses the command line, sets up tracing, bootstraps the registry from
//! the configuration file and dispatches to the command handlers. All tool
//! logic lives in `tvm-core` and the driver crates.

/// Argument parsing, CLI errors and exit codes
pub mod cli;
pub mod commands;
pub mod tracing;
