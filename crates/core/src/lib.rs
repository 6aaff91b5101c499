//! Core types and orchestration for tvm, a script-driven tool version manager.
//!
//! Tools are declared as data; each lifecycle operation (discover versions,
//! fetch, link, unlink) is a list of shell steps run by the
//! [`steps::StepExecutor`]. Drivers implementing
//! [`tools::ToolVersionManager`] are looked up by tool type through the
//! [`tools::Registry`], and [`batch::BatchOrchestrator`] fans operations out
//! across many tools.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod steps;
pub mod tools;
pub mod version;

pub use error::{Error, LinkAction, Result};
pub use version::{ToolVersion, compare_versions};
