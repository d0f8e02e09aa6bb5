//! Logging and crash reporting for the `pyxbuild` binary.
//!
//! Log events go to a per-run file under the configured log directory; the
//! console only ever shows progress and the final summary.

pub mod logging;
pub mod panic_hook;

pub use logging::{init_logging, log_file_path};
pub use panic_hook::install_panic_hook;
