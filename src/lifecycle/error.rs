//! Supervisor error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::service::BoxError;

/// Fatal errors that end [`Supervisor::run`](crate::lifecycle::Supervisor::run).
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("create service")]
    CreateService(#[source] BoxError),

    #[error("start service")]
    StartService(#[source] BoxError),
}
