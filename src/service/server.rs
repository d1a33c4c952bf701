//! HTTP status service.
//!
//! # Responsibilities
//! - Bind the configured listen address on start
//! - Report instance status (`GET /status`)
//! - Forward reload requests to the supervisor (`POST /reload`)
//! - Stop accepting and drain on close

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Options;
use crate::lifecycle::{BoxError, ReloadReceiver, Service};
use crate::service::handlers::{get_status, post_reload};

/// Key of the status service's section in the configuration.
pub const SECTION: &str = "status";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Status service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusOptions {
    /// Bind address (e.g., "127.0.0.1:9090").
    pub listen: String,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub instance: u64,
    pub reload_tx: mpsc::Sender<()>,
    pub started: Instant,
    pub sections: Arc<Vec<String>>,
}

/// A supervised HTTP server exposing status and reload endpoints.
pub struct StatusService {
    instance: u64,
    ctx: CancellationToken,
    options: StatusOptions,
    sections: Arc<Vec<String>>,
    reload_tx: mpsc::Sender<()>,
    reload_rx: Option<ReloadReceiver>,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<std::io::Result<()>>>,
}

impl StatusService {
    /// Build an instance from merged options. Nothing is bound until `start`.
    pub fn new(ctx: CancellationToken, options: &Options) -> Result<Self, serde_json::Error> {
        let status = options.section::<StatusOptions>(SECTION)?.unwrap_or_default();
        let mut sections: Vec<String> = options.sections.keys().cloned().collect();
        if options.log.is_some() {
            sections.push("log".to_string());
        }
        sections.sort();

        let (reload_tx, reload_rx) = mpsc::channel(1);
        Ok(Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            ctx,
            options: status,
            sections: Arc::new(sections),
            reload_tx,
            reload_rx: Some(reload_rx),
            local_addr: None,
            server: None,
        })
    }

    /// Factory function for [`Supervisor`](crate::lifecycle::Supervisor).
    pub fn create(ctx: CancellationToken, options: Options) -> Result<Box<dyn Service>, BoxError> {
        Ok(Box::new(Self::new(ctx, &options)?))
    }

    /// Process-unique id of this instance.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn options(&self) -> &StatusOptions {
        &self.options
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn build_router(&self) -> Router {
        let state = AppState {
            instance: self.instance,
            reload_tx: self.reload_tx.clone(),
            started: Instant::now(),
            sections: Arc::clone(&self.sections),
        };

        Router::new()
            .route("/status", get(get_status))
            .route("/reload", post(post_reload))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }
}

#[async_trait]
impl Service for StatusService {
    async fn start(&mut self) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.options.listen).await?;
        let addr = listener.local_addr()?;
        let app = self.build_router();
        let shutdown = self.ctx.clone();

        self.server = Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }));
        self.local_addr = Some(addr);

        tracing::info!(address = %addr, instance = self.instance, "Status service listening");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        self.ctx.cancel();
        if let Some(server) = self.server.take() {
            server.await??;
        }
        tracing::info!("Status service stopped");
        Ok(())
    }

    fn take_reload_receiver(&mut self) -> Option<ReloadReceiver> {
        self.reload_rx.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listen_defaults_when_section_missing() {
        let options = Options::default();
        let service = StatusService::new(CancellationToken::new(), &options).unwrap();
        assert_eq!(service.options(), &StatusOptions::default());
    }

    #[test]
    fn malformed_section_is_rejected() {
        let options: Options =
            serde_json::from_value(json!({ "status": { "listen": 5 } })).unwrap();
        assert!(StatusService::new(CancellationToken::new(), &options).is_err());
    }

    #[test]
    fn reload_receiver_is_handed_out_once() {
        let mut service = StatusService::new(CancellationToken::new(), &Options::default()).unwrap();
        assert!(service.take_reload_receiver().is_some());
        assert!(service.take_reload_receiver().is_none());
    }
}
