use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::*;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use repute_types::{Address, EventEnvelope, ReputationConstants};
use std::str::FromStr;

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::from_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid address '{}': {}", raw, e)))
}

fn parse_addresses(raw: &[String]) -> Result<Vec<Address>, ApiError> {
    raw.iter().map(|s| parse_address(s)).collect()
}

pub async fn health_check_handler() -> &'static str {
    "OK"
}

pub async fn constants_handler(State(state): State<AppState>) -> Json<ReputationConstants> {
    Json(state.registry.constants())
}

pub async fn list_users_handler(State(state): State<AppState>) -> Json<UsersResponse> {
    let users = state.registry.registered_users().await;
    let total = users.len();
    Json(UsersResponse { users, total })
}

pub async fn count_users_handler(State(state): State<AppState>) -> Json<CountResponse> {
    Json(CountResponse {
        total: state.registry.total_users().await,
    })
}

pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    let caller = parse_address(&req.caller)?;
    let (address, record) = match req.address.as_deref() {
        Some(raw) => {
            let address = parse_address(raw)?;
            (address, state.registry.register(&address).await?)
        }
        None => (caller, state.registry.register_self(&caller).await?),
    };
    tracing::debug!(%caller, %address, "register request");

    Ok((StatusCode::CREATED, Json(RecordResponse::new(address, record))))
}

pub async fn batch_register_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BatchRegisterRequest>,
) -> Result<Json<UsersResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let addresses = parse_addresses(&req.addresses)?;
    tracing::debug!(%caller, count = addresses.len(), "batch register request");

    let users = state.registry.batch_register(&addresses).await?;
    let total = users.len();
    Ok(Json(UsersResponse { users, total }))
}

pub async fn get_record_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    let address = parse_address(&raw)?;
    let record = state.registry.reputation_data(&address).await;
    Ok(Json(RecordResponse::new(address, record)))
}

pub async fn get_score_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let address = parse_address(&raw)?;
    let score = state.registry.reputation(&address).await;
    Ok(Json(ScoreResponse { address, score }))
}

pub async fn is_registered_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<RegisteredResponse>, ApiError> {
    let address = parse_address(&raw)?;
    let is_registered = state.registry.is_registered(&address).await;
    Ok(Json(RegisteredResponse {
        address,
        is_registered,
    }))
}

pub async fn set_score_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    ApiJson(req): ApiJson<SetScoreRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let address = parse_address(&raw)?;
    let caller = parse_address(&req.caller)?;

    let record = state
        .registry
        .set_reputation(&caller, &address, req.score)
        .await?;
    Ok(Json(RecordResponse::new(address, record)))
}

pub async fn reset_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    ApiJson(req): ApiJson<CallerRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let address = parse_address(&raw)?;
    let caller = parse_address(&req.caller)?;

    let record = state.registry.reset_reputation(&caller, &address).await?;
    Ok(Json(RecordResponse::new(address, record)))
}

pub async fn submit_rating_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RatingRequest>,
) -> Result<Json<RatingResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let ratee = parse_address(&req.ratee)?;
    let rating = match (req.rating, req.preset) {
        (Some(rating), None) => rating,
        (None, Some(preset)) => preset.value(),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of 'rating' or 'preset' must be provided".to_string(),
            ))
        }
    };

    let new_score = state.registry.submit_rating(&caller, &ratee, rating).await?;
    Ok(Json(RatingResponse {
        ratee,
        rating,
        new_score,
    }))
}

pub async fn batch_scores_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BatchScoresRequest>,
) -> Result<Json<BatchScoresResponse>, ApiError> {
    let addresses = parse_addresses(&req.addresses)?;
    let scores = state.registry.batch_reputations(&addresses).await;
    Ok(Json(BatchScoresResponse { scores }))
}

pub async fn events_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventsQuery>,
) -> Json<Vec<EventEnvelope>> {
    Json(state.registry.events_since(query.since.unwrap_or(0)).await)
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode Prometheus metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string())],
            format!("# ERROR: Failed to encode metrics: {}\n", e),
        );
    }

    let body = String::from_utf8_lossy(&buffer).into_owned();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
}
