use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::channel::NotificationChannel;
use super::detector::RecomputeService;
use super::dispatcher::NotificationDispatcher;
use super::domain::{AlertId, ContractNumber};
use super::queue::AlertQueue;
use super::repository::{AlertRepository, ScoreRepository};
use super::scoring::ScoreInput;
use crate::cancellation::CancellationToken;
use crate::error::{error_response, ErrorKind};

const DEFAULT_DELIVERY_LIMIT: usize = 100;

/// Services backing the score and alert endpoints.
pub struct AlertApi<S, A, C> {
    pub recompute: RecomputeService<S>,
    pub queue: AlertQueue<A>,
    pub dispatcher: Arc<NotificationDispatcher<A, C>>,
}

/// Router builder exposing the recompute trigger, alert queries, and send commands.
pub fn alert_router<S, A, C>(api: Arc<AlertApi<S, A, C>>) -> Router
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    Router::new()
        .route("/api/v1/scores", post(recompute_handler::<S, A, C>))
        .route(
            "/api/v1/scores/:contract_number",
            get(score_handler::<S, A, C>),
        )
        .route("/api/v1/alerts", get(list_handler::<S, A, C>))
        .route("/api/v1/alerts/unsent", get(unsent_handler::<S, A, C>))
        .route("/api/v1/alerts/recent", get(recent_handler::<S, A, C>))
        .route(
            "/api/v1/alerts/unread-count",
            get(unread_count_handler::<S, A, C>),
        )
        .route("/api/v1/alerts/deliveries", get(deliveries_handler::<S, A, C>))
        .route("/api/v1/alerts/send-all", post(send_all_handler::<S, A, C>))
        .route("/api/v1/alerts/:alert_id/send", post(send_one_handler::<S, A, C>))
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentQuery {
    #[serde(default)]
    pub(crate) last_seen_id: u64,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeliveriesQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnreadQuery {
    #[serde(default)]
    pub(crate) last_seen_id: u64,
}

pub(crate) async fn recompute_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
    payload: Result<Json<ScoreInput>, JsonRejection>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(ErrorKind::Validation, rejection.body_text()),
    };
    match api.recompute.recompute(input) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn score_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
    Path(contract_number): Path<String>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match api.recompute.current(&ContractNumber(contract_number)) {
        Ok(score) => (StatusCode::OK, Json(score)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn list_handler<S, A, C>(State(api): State<Arc<AlertApi<S, A, C>>>) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match api.queue.list() {
        Ok(alerts) => (StatusCode::OK, Json(alerts)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn unsent_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match api.queue.unsent() {
        Ok(alerts) => (StatusCode::OK, Json(alerts)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn recent_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
    Query(query): Query<RecentQuery>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match api
        .queue
        .recent_since(AlertId(query.last_seen_id), query.limit)
    {
        Ok(recent) => (StatusCode::OK, Json(recent)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn unread_count_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
    Query(query): Query<UnreadQuery>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match api.queue.unread_count(AlertId(query.last_seen_id)) {
        Ok(count) => (StatusCode::OK, Json(json!({ "count": count }))).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn deliveries_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
    Query(query): Query<DeliveriesQuery>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    match api
        .queue
        .delivery_attempts(query.limit.unwrap_or(DEFAULT_DELIVERY_LIMIT))
    {
        Ok(attempts) => (StatusCode::OK, Json(attempts)).into_response(),
        Err(err) => error_response(err.kind(), err),
    }
}

pub(crate) async fn send_one_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
    Path(alert_id): Path<u64>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    // Run on its own task so a disconnecting client cannot abort a delivery midway.
    let dispatcher = api.dispatcher.clone();
    let task = tokio::spawn(async move { dispatcher.send_one(AlertId(alert_id)).await });

    match task.await {
        Ok(Ok(receipt)) => (StatusCode::OK, Json(receipt)).into_response(),
        Ok(Err(err)) => error_response(err.kind(), err),
        Err(join) => error_response(ErrorKind::InfrastructureFailure, join),
    }
}

pub(crate) async fn send_all_handler<S, A, C>(
    State(api): State<Arc<AlertApi<S, A, C>>>,
) -> Response
where
    S: ScoreRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let dispatcher = api.dispatcher.clone();
    let task = tokio::spawn(async move { dispatcher.send_all_unsent(&cancel).await });

    match task.await {
        Ok(Ok(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(Err(err)) => error_response(err.kind(), err),
        Err(join) => error_response(ErrorKind::InfrastructureFailure, join),
    }
}
