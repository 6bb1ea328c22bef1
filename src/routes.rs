// Route table for the settlement API

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== TRADING ENDPOINTS =====
        .route("/quote", post(quote))
        .route("/trade", post(trade))
        .route("/tickets/:id", get(get_ticket))
        .route("/tickets/:id/exercise", post(exercise_ticket))
        .route("/tickets/:id/cancel", post(cancel_ticket))
        .route("/tickets/expire", post(expire_tickets))
        // ===== POOL ENDPOINTS =====
        .route("/pool/deposit", post(deposit))
        .route("/pool/start", post(start_pool))
        .route("/pool/withdrawal-request", post(withdrawal_request))
        .route("/pool/exercise-batch", post(exercise_batch))
        .route("/pool/close/prepare", post(prepare_round_closing))
        .route("/pool/close/batch", post(process_round_closing_batch))
        .route("/pool/close", post(close_round))
        .route("/pool/round/:index", get(get_round))
        // ===== RESULTS & RISK ENDPOINTS =====
        .route("/results", post(set_results))
        .route("/risk/:game_id", get(get_game_risk))
        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        // Apply CORS and state
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
