//! Shared utilities for supervisor integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use service_supervisor::config::Options;
use service_supervisor::lifecycle::{BoxError, ReloadReceiver, Service, ServiceFactory, Watchdog};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How fake instances behave.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub start_delay: Option<Duration>,
    pub start_fails: bool,
    pub close_fails: bool,
    pub close_hangs: bool,
}

/// Ordered record of everything fake instances did.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    options: Arc<Mutex<Vec<Options>>>,
}

impl Journal {
    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries().iter().any(|e| e == entry)
    }

    /// Options handed to each created instance, in creation order.
    pub fn options(&self) -> Vec<Options> {
        self.options.lock().unwrap().clone()
    }

    /// Poll until `entry` shows up.
    pub async fn wait_for(&self, entry: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !self.contains(entry) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {entry}, journal: {:?}",
                self.entries()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Builds [`FakeService`]s and keeps their reload senders.
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub journal: Journal,
    pub behavior: Behavior,
    generation: Arc<AtomicU32>,
    reload_senders: Arc<Mutex<Vec<mpsc::Sender<()>>>>,
}

impl FakeFactory {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Reload sender of the most recently created instance.
    pub fn reload_sender(&self) -> mpsc::Sender<()> {
        self.reload_senders
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no instance created yet")
    }
}

impl ServiceFactory for FakeFactory {
    fn create(&self, ctx: CancellationToken, options: Options) -> Result<Box<dyn Service>, BoxError> {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.push(format!("create:{id}"));
        self.journal.options.lock().unwrap().push(options);

        let (reload_tx, reload_rx) = mpsc::channel(1);
        self.reload_senders.lock().unwrap().push(reload_tx);

        Ok(Box::new(FakeService {
            id,
            ctx,
            behavior: self.behavior.clone(),
            journal: self.journal.clone(),
            reload_rx: Some(reload_rx),
        }))
    }
}

pub struct FakeService {
    id: u32,
    ctx: CancellationToken,
    behavior: Behavior,
    journal: Journal,
    reload_rx: Option<ReloadReceiver>,
}

#[async_trait]
impl Service for FakeService {
    async fn start(&mut self) -> Result<(), BoxError> {
        if let Some(delay) = self.behavior.start_delay {
            tokio::time::sleep(delay).await;
        }
        self.journal.push(format!("start:{}", self.id));
        if self.ctx.is_cancelled() {
            self.journal.push(format!("start-cancelled:{}", self.id));
        }
        if self.behavior.start_fails {
            return Err("port already in use".into());
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        assert!(self.ctx.is_cancelled(), "close called before cancellation");
        self.journal.push(format!("close:{}", self.id));
        if self.behavior.close_hangs {
            std::future::pending::<()>().await;
        }
        if self.behavior.close_fails {
            return Err("connections still open".into());
        }
        Ok(())
    }

    fn take_reload_receiver(&mut self) -> Option<ReloadReceiver> {
        self.reload_rx.take()
    }
}

/// Watchdog that records fired operations instead of exiting.
pub fn recording_watchdog(timeout: Duration) -> (Watchdog, Arc<Mutex<Vec<&'static str>>>) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let watchdog = Watchdog::with_action(
        timeout,
        Arc::new(move |operation| sink.lock().unwrap().push(operation)),
    );
    (watchdog, fired)
}

/// Write a config file and return its path.
pub fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
