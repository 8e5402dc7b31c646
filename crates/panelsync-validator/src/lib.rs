//! Panelsync Content Validator
//!
//! Pure checks that gate configuration on its way into the draft store, and
//! the security/syntax screen for generated device drivers.
//!
//! # Example
//!
//! ```rust
//! use panelsync_validator::{ContentValidator, Inventory};
//!
//! let inventory = Inventory::new().with_device("amp", ["volume"]);
//! let page = r#"{"name":"Main","elements":[]}"#;
//!
//! let report = ContentValidator::default()
//!     .validate_raw([("gui/pages/main.json", page)], &inventory);
//! assert!(report.is_valid());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod driver_screen;
pub mod geometry;
pub mod inventory;
pub mod report;
mod rules;
pub mod validator;

pub use config::ValidatorConfig;
pub use driver_screen::{
    Capability, DriverScreen, ScreenError, ScreenReport, ScreenViolation, ViolationKind,
    BASE_DRIVER_CLASS, REQUIRED_OPERATIONS,
};
pub use inventory::Inventory;
pub use report::{IssueCode, Severity, ValidationIssue, ValidationReport};
pub use validator::ContentValidator;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
