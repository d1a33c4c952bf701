//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Create (supervisor.rs):
//!     Load + merge config → overrides → child token → factory → start
//!
//! Run (supervisor.rs):
//!     SIGHUP / reload request → check config → close → create again
//!     SIGTERM / SIGINT        → close → stopped
//!
//! Signals (signals.rs):
//!     OS signals (or injected ones) → LifecycleSignal
//!
//! Watchdog (watchdog.rs):
//!     armed around every close (and a start interrupted by a signal)
//!     → process exit if the deadline passes
//! ```
//!
//! # Design Decisions
//! - One control task; transitions never run concurrently
//! - Close is always preceded by cancellation of the instance's token
//! - A broken replacement config never tears down a running instance

pub mod error;
pub mod service;
pub mod signals;
pub mod supervisor;
pub mod watchdog;

pub use error::SupervisorError;
pub use service::{BoxError, ReloadReceiver, Service, ServiceFactory};
pub use signals::{ChannelSignals, LifecycleSignal, OsSignals, SignalSource};
pub use supervisor::{Supervisor, SupervisorEvent, SupervisorState};
pub use watchdog::{Watchdog, WatchdogGuard, FATAL_STOP_TIMEOUT};
