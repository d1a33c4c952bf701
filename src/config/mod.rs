//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config files / config directories / stdin
//!     → loader.rs (read, YAML → JSON, decode)
//!     → ConfigFragment per source, sorted by path
//!     → merge.rs (deep merge, later path wins)
//!     → Options (handed to the supervised service)
//!
//! On reload (SIGHUP, service request, watcher.rs):
//!     → loader.rs + merge.rs re-run as a check
//!     → supervisor rebuilds the service only if the check passes
//! ```
//!
//! # Design Decisions
//! - Options are immutable once built; changes require a full rebuild
//! - Only structure is checked here; semantics belong to the service
//! - Merge precedence depends on path order only, never on directory listing order

pub mod error;
pub mod loader;
pub mod merge;
pub mod schema;
pub mod watcher;

pub use error::{ConfigError, MergeError};
pub use loader::{read_config, read_config_at, ConfigFragment, ConfigSources};
pub use merge::{merge_json, read_config_and_merge};
pub use schema::{LogOptions, Options};
pub use watcher::ConfigWatcher;
