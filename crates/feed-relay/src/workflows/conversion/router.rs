use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::domain::OverridePatch;
use super::service::{ConversionService, RunTrigger};
use crate::error::AppError;

const RECENT_RUNS: usize = 30;

/// Router exposing manual runs, the group dashboard and the current artifact.
pub fn conversion_router(service: Arc<ConversionService>) -> Router {
    Router::new()
        .route("/api/v1/convert", post(convert_handler))
        .route("/api/v1/groups", get(groups_handler))
        .route(
            "/api/v1/groups/:name/override",
            get(get_override_handler).put(put_override_handler),
        )
        .route("/api/v1/runs", get(runs_handler))
        .route("/feed.xml", get(feed_handler))
        .with_state(service)
}

pub(crate) async fn convert_handler(State(service): State<Arc<ConversionService>>) -> Response {
    let worker = Arc::clone(&service);
    let result = tokio::task::spawn_blocking(move || worker.run(RunTrigger::Manual)).await;

    match result {
        Ok(Ok(stats)) => {
            let payload = json!({
                "success": true,
                "stats": stats,
                "last_run": service.last_run(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(err)) => AppError::from(err).into_response(),
        Err(err) => task_failure(err),
    }
}

pub(crate) async fn groups_handler(State(service): State<Arc<ConversionService>>) -> Response {
    let result = tokio::task::spawn_blocking(move || service.group_summaries()).await;

    match result {
        Ok(Ok(groups)) => {
            let configured = groups.iter().filter(|group| group.configured).count();
            let payload = json!({
                "groups": groups,
                "configured": configured,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(err)) => AppError::from(err).into_response(),
        Err(err) => task_failure(err),
    }
}

pub(crate) async fn get_override_handler(
    State(service): State<Arc<ConversionService>>,
    Path(name): Path<String>,
) -> Response {
    let lookup = name.clone();
    let result = tokio::task::spawn_blocking(move || service.group_override(&lookup)).await;

    match result {
        Ok(Ok(rule)) => {
            let payload = json!({
                "group": name,
                "override": rule,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(err)) => AppError::from(err).into_response(),
        Err(err) => task_failure(err),
    }
}

pub(crate) async fn put_override_handler(
    State(service): State<Arc<ConversionService>>,
    Path(name): Path<String>,
    Json(patch): Json<OverridePatch>,
) -> Response {
    let group = name.clone();
    let result =
        tokio::task::spawn_blocking(move || service.update_override(&group, patch)).await;

    match result {
        Ok(Ok(rule)) => {
            let payload = json!({
                "group": name,
                "override": rule,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(err)) => AppError::from(err).into_response(),
        Err(err) => task_failure(err),
    }
}

pub(crate) async fn runs_handler(State(service): State<Arc<ConversionService>>) -> Response {
    let payload = json!({
        "last_run": service.last_run(),
        "entries": service.recent_runs(RECENT_RUNS),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn feed_handler(State(service): State<Arc<ConversionService>>) -> Response {
    match tokio::fs::read(service.output_path()).await {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            document,
        )
            .into_response(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let payload = json!({
                "error": "feed has not been generated yet",
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => {
            error!(error = %err, "failed to read feed artifact");
            AppError::from(err).into_response()
        }
    }
}

fn task_failure(err: tokio::task::JoinError) -> Response {
    error!(error = %err, "blocking task failed");
    let payload = json!({
        "error": "internal task failure",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}
