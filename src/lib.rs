//! Service supervisor library.
//!
//! Loads and merges configuration fragments, then keeps one service instance
//! running: rebuilding it on SIGHUP or on request, stopping it on SIGINT /
//! SIGTERM, and bounding every close with a watchdog.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use config::{ConfigSources, Options};
pub use lifecycle::{Service, ServiceFactory, Supervisor, SupervisorState};
