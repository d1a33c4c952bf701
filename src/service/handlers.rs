use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

use crate::service::server::AppState;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub version: &'static str,
    pub status: &'static str,
    pub instance: u64,
    pub uptime_secs: u64,
    /// Top-level configuration sections the instance was built with.
    pub sections: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReloadReply {
    pub reload: &'static str,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        instance: state.instance,
        uptime_secs: state.started.elapsed().as_secs(),
        sections: state.sections.as_ref().clone(),
    })
}

/// Ask the supervisor to rebuild this instance.
pub async fn post_reload(State(state): State<AppState>) -> (StatusCode, Json<ReloadReply>) {
    match state.reload_tx.try_send(()) {
        Ok(()) => {
            tracing::info!("Reload requested over HTTP");
            (StatusCode::ACCEPTED, Json(ReloadReply { reload: "queued" }))
        }
        // one reload is already waiting to be picked up
        Err(TrySendError::Full(())) => {
            (StatusCode::ACCEPTED, Json(ReloadReply { reload: "pending" }))
        }
        Err(TrySendError::Closed(())) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReloadReply { reload: "unavailable" }),
        ),
    }
}
