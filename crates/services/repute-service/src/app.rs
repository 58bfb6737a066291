use crate::handlers::{
    batch_register_handler, batch_scores_handler, constants_handler, count_users_handler,
    events_handler, get_record_handler, get_score_handler, health_check_handler,
    is_registered_handler, list_users_handler, metrics_handler, register_handler, reset_handler,
    set_score_handler, submit_rating_handler,
};
use axum::{
    routing::{get, post},
    Router,
};
use repute_registry::ReputationRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ReputationRegistry>,
}

pub fn create_app(registry: Arc<ReputationRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/metrics", get(metrics_handler))
        .route("/registry/constants", get(constants_handler))
        .route(
            "/registry/users",
            get(list_users_handler).post(register_handler),
        )
        .route("/registry/users/count", get(count_users_handler))
        .route("/registry/users/batch", post(batch_register_handler))
        .route("/registry/users/:address", get(get_record_handler))
        .route(
            "/registry/users/:address/score",
            get(get_score_handler).put(set_score_handler),
        )
        .route(
            "/registry/users/:address/registered",
            get(is_registered_handler),
        )
        .route("/registry/users/:address/reset", post(reset_handler))
        .route("/registry/ratings", post(submit_rating_handler))
        .route("/registry/scores/batch", post(batch_scores_handler))
        .route("/registry/events", get(events_handler))
        .with_state(AppState { registry })
}
