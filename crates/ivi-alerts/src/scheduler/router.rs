use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::repository::SchedulerRepository;
use super::service::NotificationScheduler;
use super::settings::SettingsUpdate;
use crate::cancellation::CancellationToken;
use crate::error::{error_response, ErrorKind};
use crate::risk::{AlertRepository, NotificationChannel};

const DEFAULT_LOG_LIMIT: usize = 100;

/// Router builder exposing scheduler status, settings, manual trigger, and run history.
pub fn scheduler_router<S, A, C>(scheduler: Arc<NotificationScheduler<S, A, C>>) -> Router
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    Router::new()
        .route("/api/v1/scheduler/status", get(status_handler::<S, A, C>))
        .route(
            "/api/v1/scheduler/settings",
            put(update_settings_handler::<S, A, C>),
        )
        .route("/api/v1/scheduler/trigger", post(trigger_handler::<S, A, C>))
        .route("/api/v1/scheduler/logs", get(logs_handler::<S, A, C>))
        .with_state(scheduler)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogsQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn status_handler<S, A, C>(
    State(scheduler): State<Arc<NotificationScheduler<S, A, C>>>,
) -> Response
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match scheduler.status() {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn update_settings_handler<S, A, C>(
    State(scheduler): State<Arc<NotificationScheduler<S, A, C>>>,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Response
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(ErrorKind::Validation, rejection.body_text()),
    };
    match scheduler.update_settings(&update) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn trigger_handler<S, A, C>(
    State(scheduler): State<Arc<NotificationScheduler<S, A, C>>>,
) -> Response
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let task = tokio::spawn(async move { scheduler.trigger_now(&cancel).await });

    match task.await {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(Err(err)) => error_response(err.kind(), err),
        Err(join) => error_response(ErrorKind::InfrastructureFailure, join),
    }
}

pub(crate) async fn logs_handler<S, A, C>(
    State(scheduler): State<Arc<NotificationScheduler<S, A, C>>>,
    Query(query): Query<LogsQuery>,
) -> Response
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match scheduler.logs(query.limit.unwrap_or(DEFAULT_LOG_LIMIT)) {
        Ok(logs) => (StatusCode::OK, Json(logs)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}
