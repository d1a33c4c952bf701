//! OS signal handling.
//!
//! - SIGTERM / SIGINT → shutdown
//! - SIGHUP → reload
//!
//! The supervisor consumes signals through [`SignalSource`], so tests can
//! inject synthetic signals with [`ChannelSignals`] instead of raising real
//! ones.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Lifecycle events delivered by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl LifecycleSignal {
    /// Whether this signal asks for a configuration reload.
    pub fn is_reload(self) -> bool {
        matches!(self, LifecycleSignal::Hangup)
    }

    pub fn name(self) -> &'static str {
        match self {
            LifecycleSignal::Interrupt => "SIGINT",
            LifecycleSignal::Terminate => "SIGTERM",
            LifecycleSignal::Hangup => "SIGHUP",
        }
    }
}

impl std::fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A stream of lifecycle signals.
///
/// `recv` returns `None` once the source can never produce another signal.
#[async_trait]
pub trait SignalSource: Send {
    async fn recv(&mut self) -> Option<LifecycleSignal>;
}

/// Subscription to the process's interrupt, terminate and hangup signals.
///
/// Dropping the subscription unsubscribes.
#[cfg(unix)]
pub struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Register the handlers. Must be called from within a Tokio runtime.
    pub fn subscribe() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let subscription = Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        };
        tracing::debug!("Subscribed to SIGINT, SIGTERM and SIGHUP");
        Ok(subscription)
    }
}

#[cfg(unix)]
#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<LifecycleSignal> {
        let signal = tokio::select! {
            received = self.interrupt.recv() => received.map(|()| LifecycleSignal::Interrupt),
            received = self.terminate.recv() => received.map(|()| LifecycleSignal::Terminate),
            received = self.hangup.recv() => received.map(|()| LifecycleSignal::Hangup),
        };
        if let Some(signal) = signal {
            tracing::info!(%signal, "Received signal");
        }
        signal
    }
}

/// Ctrl-C only subscription for platforms without Unix signals.
#[cfg(not(unix))]
pub struct OsSignals {
    _private: (),
}

#[cfg(not(unix))]
impl OsSignals {
    pub fn subscribe() -> std::io::Result<Self> {
        Ok(Self { _private: () })
    }
}

#[cfg(not(unix))]
#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<LifecycleSignal> {
        tokio::signal::ctrl_c().await.ok()?;
        tracing::info!("Received Ctrl-C");
        Some(LifecycleSignal::Interrupt)
    }
}

/// In-process signal source fed through a channel.
pub struct ChannelSignals {
    rx: mpsc::UnboundedReceiver<LifecycleSignal>,
}

impl ChannelSignals {
    /// Create a source and the sender used to raise signals on it.
    pub fn new() -> (mpsc::UnboundedSender<LifecycleSignal>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl SignalSource for ChannelSignals {
    async fn recv(&mut self) -> Option<LifecycleSignal> {
        self.rx.recv().await
    }
}
