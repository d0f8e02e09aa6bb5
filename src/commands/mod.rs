//! CLI command implementations.
//!
//! - **build**: stage, convert, build and reconcile a project
//! - **check**: analysis-only compatibility report
//! - **init**: write a default configuration file

pub mod build;
pub mod check;
pub mod init;

pub use build::{format_summary, run_build};
pub use check::run_check;
pub use init::init_config;
