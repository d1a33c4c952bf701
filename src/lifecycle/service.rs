//! Contract between the supervisor and the service it runs.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Options;

/// Error type returned by service implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Receiving half of a service's reload channel.
pub type ReloadReceiver = mpsc::Receiver<()>;

/// A long-running service instance owned by the supervisor.
///
/// `start` and `close` are awaited to completion by the supervisor; the
/// token handed to the factory is cancelled before `close` is called.
#[async_trait]
pub trait Service: Send {
    async fn start(&mut self) -> Result<(), BoxError>;

    async fn close(&mut self) -> Result<(), BoxError>;

    /// Hand over the channel on which the service asks to be reloaded.
    ///
    /// Called once per instance, after construction. `None` means the
    /// service never requests reloads itself.
    fn take_reload_receiver(&mut self) -> Option<ReloadReceiver> {
        None
    }
}

/// Builds a fresh service instance for every create cycle.
pub trait ServiceFactory: Send + Sync {
    fn create(&self, ctx: CancellationToken, options: Options) -> Result<Box<dyn Service>, BoxError>;
}

impl<F> ServiceFactory for F
where
    F: Fn(CancellationToken, Options) -> Result<Box<dyn Service>, BoxError> + Send + Sync,
{
    fn create(&self, ctx: CancellationToken, options: Options) -> Result<Box<dyn Service>, BoxError> {
        self(ctx, options)
    }
}
