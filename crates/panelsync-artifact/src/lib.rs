//! Panelsync Artifact Types
//!
//! Identifiers and content containers shared by every other panelsync crate.
//!
//! # Core Concepts
//!
//! - [`ControllerId`]: Identifier of an edge controller
//! - [`ConfigPath`]: Validated, namespaced path of a configuration file
//! - [`FileSet`]: Ordered path → content map with a stable checksum
//! - [`ContentHash`]: 32-byte Blake3 digest
//! - [`DriverArtifact`]: Generated device-driver source plus command metadata
//!
//! # Example
//!
//! ```rust
//! use panelsync_artifact::{ConfigPath, FileSet, Namespace};
//!
//! let path = ConfigPath::parse("gui/pages/main.json").unwrap();
//! assert_eq!(path.namespace(), Namespace::Page);
//!
//! let mut files = FileSet::new();
//! files.insert(path, r#"{"name":"Main","elements":[]}"#);
//! println!("checksum: {}", files.checksum().short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod driver;
mod file;
mod hash;
mod ids;
mod path;

pub use driver::{CommandMapping, DriverArtifact};
pub use file::{changes_to_file_set, FileChange, FileSet};
pub use hash::{ContentHash, HashError};
pub use ids::{ControllerId, IdError};
pub use path::{ConfigPath, Namespace, PathError, CONFIG_EXTENSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
