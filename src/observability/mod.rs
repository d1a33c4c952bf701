//! Observability subsystem.
//!
//! All subsystems log through `tracing` with structured fields; the
//! subscriber is installed once by the binary (logging.rs).

pub mod logging;

pub use logging::{init as init_logging, LoggingConfig};
