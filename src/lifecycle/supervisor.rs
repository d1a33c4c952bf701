//! The service supervisor state machine.
//!
//! ```text
//! Creating ──start ok──▶ Running ──SIGHUP / reload request──▶ Reloading
//!    ▲                     │  ▲                                  │    │
//!    │                     │  └────────── check failed ──────────┘    │
//!    └──────── close (best effort) ◀──────── check passed ────────────┘
//!                          │
//!                          └──SIGINT / SIGTERM──▶ Closing ──▶ Stopped
//! ```
//!
//! Exactly one service instance is alive at a time. A replacement is only
//! built after the previous instance's `close` has returned.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::error::error_chain;
use crate::config::{read_config_and_merge, ConfigError, ConfigSources};
use crate::lifecycle::error::SupervisorError;
use crate::lifecycle::service::{ReloadReceiver, Service, ServiceFactory};
use crate::lifecycle::signals::{LifecycleSignal, SignalSource};
use crate::lifecycle::watchdog::{Watchdog, WatchdogGuard};

/// Lifecycle state of the supervised instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    Creating,
    Running,
    Reloading,
    Closing,
    Stopped,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SupervisorState::Creating => "creating",
            SupervisorState::Running => "running",
            SupervisorState::Reloading => "reloading",
            SupervisorState::Closing => "closing",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// An OS (or injected) signal.
    Signal(LifecycleSignal),
    /// The service or the config watcher asked for a reload.
    ReloadRequested,
    /// The root token was cancelled by the owner of the supervisor.
    RootCancelled,
    /// The signal source ended; nothing can stop the service any more.
    SignalsClosed,
}

impl SupervisorEvent {
    /// Whether the event asks for a rebuild rather than a shutdown.
    pub fn is_reload(self) -> bool {
        match self {
            SupervisorEvent::Signal(signal) => signal.is_reload(),
            SupervisorEvent::ReloadRequested => true,
            SupervisorEvent::RootCancelled | SupervisorEvent::SignalsClosed => false,
        }
    }
}

/// A started instance together with its cancellation token.
struct LiveService {
    instance: Box<dyn Service>,
    ctx: CancellationToken,
    /// Event that arrived while the instance was starting.
    pending: Option<SupervisorEvent>,
}

/// Owns the service instance and rebuilds or stops it on demand.
pub struct Supervisor {
    sources: ConfigSources,
    root: CancellationToken,
    disable_color: bool,
    factory: Box<dyn ServiceFactory>,
    signals: Box<dyn SignalSource>,
    watchdog: Watchdog,
    reload_trigger: Option<mpsc::Receiver<()>>,
    state: watch::Sender<SupervisorState>,
    generation: u64,
}

impl Supervisor {
    pub fn new(
        sources: ConfigSources,
        root: CancellationToken,
        factory: impl ServiceFactory + 'static,
        signals: impl SignalSource + 'static,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Creating);
        Self {
            sources,
            root,
            disable_color: false,
            factory: Box::new(factory),
            signals: Box::new(signals),
            watchdog: Watchdog::default(),
            reload_trigger: None,
            state,
            generation: 0,
        }
    }

    /// Force colourless logging in every created instance's options.
    pub fn disable_color(mut self, disable: bool) -> Self {
        self.disable_color = disable;
        self
    }

    pub fn watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Extra reload notifications, independent of the service instance.
    pub fn reload_trigger(mut self, trigger: mpsc::Receiver<()>) -> Self {
        self.reload_trigger = Some(trigger);
        self
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Follow state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Validate the configuration sources without touching the instance.
    pub fn check(&self) -> Result<(), ConfigError> {
        read_config_and_merge(&self.sources).map(|_| ())
    }

    /// Run until a shutdown signal, or a fatal create/start error.
    pub async fn run(&mut self) -> Result<(), SupervisorError> {
        loop {
            let LiveService {
                mut instance,
                ctx,
                mut pending,
            } = self.create().await?;
            let mut reload_rx = instance.take_reload_receiver();

            loop {
                let event = match pending.take() {
                    Some(event) => event,
                    None => self.next_event(&mut reload_rx).await,
                };

                if !event.is_reload() {
                    tracing::info!(?event, instance = self.generation, "Stopping service");
                    self.transition(SupervisorState::Closing);
                    ctx.cancel();
                    if let Err(err) = self.watchdog.guard("close", instance.close()).await {
                        tracing::error!(
                            error = %error_chain(&*err),
                            "Service did not close properly"
                        );
                    }
                    self.transition(SupervisorState::Stopped);
                    return Ok(());
                }

                self.transition(SupervisorState::Reloading);
                if let Err(err) = self.check() {
                    tracing::error!(
                        ?event,
                        error = %error_chain(&err),
                        "Reload service failed, keeping current instance"
                    );
                    self.transition(SupervisorState::Running);
                    continue;
                }

                tracing::info!(?event, instance = self.generation, "Reloading service");
                ctx.cancel();
                // a failed close must not prevent the replacement from starting
                if let Err(err) = self.watchdog.guard("close", instance.close()).await {
                    tracing::warn!(
                        error = %error_chain(&*err),
                        "Previous instance did not close properly"
                    );
                }
                break;
            }
        }
    }

    /// Build and start a new instance from freshly merged options.
    async fn create(&mut self) -> Result<LiveService, SupervisorError> {
        self.transition(SupervisorState::Creating);
        self.generation += 1;

        let mut options = read_config_and_merge(&self.sources)?;
        if self.disable_color {
            options.force_disable_color();
        }

        let ctx = self.root.child_token();
        let mut instance = self
            .factory
            .create(ctx.clone(), options)
            .map_err(|source| {
                ctx.cancel();
                SupervisorError::CreateService(source)
            })?;

        // Signals stay subscribed while starting: a stop request during a
        // slow start cancels it and puts the start under the watchdog.
        let mut pending = None;
        let mut start_watchdog: Option<WatchdogGuard> = None;
        let started = {
            let mut start = instance.start();
            loop {
                let event = tokio::select! {
                    result = &mut start => break result,
                    signal = self.signals.recv(), if pending.is_none() => {
                        signal.map_or(SupervisorEvent::SignalsClosed, SupervisorEvent::Signal)
                    }
                    _ = self.root.cancelled(), if pending.is_none() => SupervisorEvent::RootCancelled,
                };
                tracing::warn!(?event, "Event received while starting service");
                ctx.cancel();
                start_watchdog = Some(self.watchdog.arm("start"));
                pending = Some(event);
            }
        };
        if let Some(guard) = start_watchdog {
            guard.disarm();
        }

        if let Err(source) = started {
            ctx.cancel();
            self.transition(SupervisorState::Stopped);
            return Err(SupervisorError::StartService(source));
        }

        tracing::info!(instance = self.generation, "Service started");
        self.transition(SupervisorState::Running);
        Ok(LiveService {
            instance,
            ctx,
            pending,
        })
    }

    async fn next_event(&mut self, reload_rx: &mut Option<ReloadReceiver>) -> SupervisorEvent {
        tokio::select! {
            _ = self.root.cancelled() => SupervisorEvent::RootCancelled,
            signal = self.signals.recv() => {
                signal.map_or(SupervisorEvent::SignalsClosed, SupervisorEvent::Signal)
            }
            () = next_reload(reload_rx) => SupervisorEvent::ReloadRequested,
            () = next_reload(&mut self.reload_trigger) => SupervisorEvent::ReloadRequested,
        }
    }

    fn transition(&self, to: SupervisorState) {
        let from = self.state.send_replace(to);
        tracing::debug!(%from, %to, "Supervisor state changed");
    }
}

/// Wait for a reload notification. Never resolves once the channel closed.
async fn next_reload(rx: &mut Option<ReloadReceiver>) {
    if let Some(inner) = rx.as_mut() {
        if inner.recv().await.is_some() {
            return;
        }
        *rx = None;
    }
    std::future::pending::<()>().await
}
