// HTTP push endpoint: the delivery layer POSTs one envelope per job and
// treats any non-2xx response as a failed delivery.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ghsync_common::protocol::push::decode_inbound;
use ghsync_common::DecodeError;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::{info, warn, Level};
use uuid::Uuid;

use crate::git::CommandExecutor;
use crate::pipeline::{JobPipeline, PipelineError, Stage};

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    DecodeFailed,
    JobFailed,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DecodeFailed => "DECODE_FAILED",
            Self::JobFailed => "JOB_FAILED",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::DecodeFailed => StatusCode::BAD_REQUEST,
            Self::JobFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    stage: Option<Stage>,
}

impl ApiError {
    fn decode(error: &DecodeError) -> Self {
        Self { code: ErrorCode::DecodeFailed, message: error.to_string(), stage: None }
    }

    fn job(error: &PipelineError) -> Self {
        Self {
            code: ErrorCode::JobFailed,
            message: error.source.to_string(),
            stage: Some(error.stage),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "stage": self.stage.map(Stage::as_str),
            }
        });
        (self.code.status(), Json(body)).into_response()
    }
}

pub fn router<E>(pipeline: Arc<JobPipeline<E>>) -> Router
where
    E: CommandExecutor + Clone + 'static,
{
    Router::new()
        .route("/", post(handle_push::<E>))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        // Failed jobs are already logged at ERROR by the pipeline.
        .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::WARN)))
        .with_state(pipeline)
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn handle_push<E>(
    State(pipeline): State<Arc<JobPipeline<E>>>,
    body: Bytes,
) -> Result<StatusCode, ApiError>
where
    E: CommandExecutor + Clone + 'static,
{
    let inbound = decode_inbound(&body).map_err(|error| {
        warn!(error = %error, "rejecting undecodable push message");
        ApiError::decode(&error)
    })?;

    let job_id = inbound.message_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    pipeline.run(&inbound.job, &job_id).await.map_err(|error| ApiError::job(&error))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn serve<E>(pipeline: Arc<JobPipeline<E>>, addr: SocketAddr) -> anyhow::Result<()>
where
    E: CommandExecutor + Clone + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind push listener on {addr}"))?;

    info!(listen_addr = %addr, "starting push endpoint");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("push endpoint exited unexpectedly")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
