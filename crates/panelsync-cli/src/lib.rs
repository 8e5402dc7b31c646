//! Panelsync command-line tools
//!
//! Offline content validation, driver screening and an in-process
//! end-to-end simulation of the draft → deploy → sync → live flow.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod logging;
pub mod screen;
pub mod simulate;
pub mod validate;

pub use simulate::{run_simulator, ControllerOutcome, SimulatorConfig, SimulatorReport};
pub use validate::FileArg;

/// Panelsync CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
