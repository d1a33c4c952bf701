//! Built-in supervised service.
//!
//! A small HTTP server that reports its own status and lets operators
//! request a reload without sending SIGHUP.

pub mod handlers;
pub mod server;

pub use server::{StatusOptions, StatusService};
