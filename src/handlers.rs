// HTTP request handlers for the settlement API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::amm::{AmmError, TradeRequest};
use crate::app_state::SharedState;
use crate::clock;
use crate::models::*;
use crate::pool::Round;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to an HTTP status: admission failures and bad input are
/// 400, sequencing conflicts 409, missing resources 404.
fn reject(err: AmmError) -> ApiError {
    let status = match &err {
        AmmError::TicketNotFound(_) => StatusCode::NOT_FOUND,
        AmmError::Risk(_) | AmmError::Vault(_) => StatusCode::BAD_REQUEST,
        AmmError::Ticket(_) => StatusCode::CONFLICT,
        AmmError::Pool(_) => StatusCode::CONFLICT,
    };
    tracing::warn!(error = %err, "request rejected");
    (status, Json(ErrorResponse::new(err)))
}

// ===== TRADING =====

pub async fn quote(
    State(state): State<SharedState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let app_state = state.lock().unwrap();
    let quote = app_state
        .amm
        .trade_quote(&request, clock::now())
        .map_err(reject)?;
    Ok(Json(QuoteResponse {
        success: true,
        total_quote: quote.total_quote,
        payout: quote.payout,
        fee: quote.fee,
        bound_round: quote.binding.round,
    }))
}

pub async fn trade(
    State(state): State<SharedState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<TradeResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let ticket_id = app_state
        .amm
        .trade(request, clock::now())
        .map_err(reject)?;
    Ok(Json(TradeResponse {
        success: true,
        ticket_id,
    }))
}

pub async fn get_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<crate::ticket::Ticket>, ApiError> {
    let app_state = state.lock().unwrap();
    let ticket = app_state.amm.ticket(&id).map_err(reject)?;
    Ok(Json(ticket.clone()))
}

pub async fn exercise_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ExerciseResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let settlement = app_state
        .amm
        .exercise_ticket(&id, clock::now())
        .map_err(reject)?;
    Ok(Json(ExerciseResponse {
        success: true,
        winner: settlement.winner,
        pay_out: settlement.pay_out,
    }))
}

pub async fn cancel_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let refund = app_state
        .amm
        .cancel_ticket_by_owner(&id, &request.caller, clock::now())
        .map_err(reject)?;
    Ok(Json(CancelResponse {
        success: true,
        refund,
    }))
}

pub async fn expire_tickets(
    State(state): State<SharedState>,
) -> Result<Json<ExpireResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let expired = app_state
        .amm
        .expire_tickets(clock::now())
        .map_err(reject)?;
    Ok(Json(ExpireResponse {
        success: true,
        expired,
    }))
}

// ===== POOL =====

pub async fn deposit(
    State(state): State<SharedState>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let round = app_state
        .amm
        .deposit(&request.user, request.amount)
        .map_err(reject)?;
    Ok(Json(DepositResponse {
        success: true,
        round,
    }))
}

pub async fn start_pool(
    State(state): State<SharedState>,
) -> Result<Json<OkResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    app_state.amm.start_pool(clock::now()).map_err(reject)?;
    Ok(Json(OkResponse { success: true }))
}

pub async fn withdrawal_request(
    State(state): State<SharedState>,
    Json(request): Json<WithdrawalRequestBody>,
) -> Result<Json<OkResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    match request.share {
        Some(share) => app_state
            .amm
            .partial_withdrawal_request(&request.user, share)
            .map_err(reject)?,
        None => app_state
            .amm
            .withdrawal_request(&request.user)
            .map_err(reject)?,
    }
    Ok(Json(OkResponse { success: true }))
}

pub async fn exercise_batch(
    State(state): State<SharedState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let processed = app_state
        .amm
        .exercise_tickets_ready_batch(request.batch_size, clock::now())
        .map_err(reject)?;
    Ok(Json(BatchResponse {
        success: true,
        processed,
    }))
}

pub async fn prepare_round_closing(
    State(state): State<SharedState>,
) -> Result<Json<PrepareCloseResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let profit_and_loss = app_state
        .amm
        .prepare_round_closing(clock::now())
        .map_err(reject)?;
    Ok(Json(PrepareCloseResponse {
        success: true,
        profit_and_loss,
    }))
}

pub async fn process_round_closing_batch(
    State(state): State<SharedState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let processed = app_state
        .amm
        .process_round_closing_batch(request.batch_size)
        .map_err(reject)?;
    Ok(Json(BatchResponse {
        success: true,
        processed,
    }))
}

pub async fn close_round(
    State(state): State<SharedState>,
) -> Result<Json<CloseResponse>, ApiError> {
    let mut app_state = state.lock().unwrap();
    let next_round = app_state.amm.close_round(clock::now()).map_err(reject)?;
    Ok(Json(CloseResponse {
        success: true,
        next_round,
    }))
}

pub async fn get_round(
    State(state): State<SharedState>,
    Path(index): Path<u32>,
) -> Result<Json<Round>, ApiError> {
    let app_state = state.lock().unwrap();
    let round = app_state.amm.pool.round(index).cloned().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Round not found: {}", index))),
        )
    })?;
    Ok(Json(round))
}

// ===== RESULTS & RISK =====

pub async fn set_results(
    State(state): State<SharedState>,
    Json(request): Json<ResultsRequest>,
) -> Result<Json<ResultsResponse>, ApiError> {
    if request.game_ids.len() != request.type_ids.len()
        || request.game_ids.len() != request.player_ids.len()
        || request.game_ids.len() != request.winning_positions.len()
    {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("results arrays must have equal length")),
        ));
    }
    let mut app_state = state.lock().unwrap();
    let newly_set = app_state.amm.set_results(
        &request.game_ids,
        &request.type_ids,
        &request.player_ids,
        &request.winning_positions,
    );
    Ok(Json(ResultsResponse {
        success: true,
        newly_set,
    }))
}

pub async fn get_game_risk(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
) -> Json<GameRiskResponse> {
    let app_state = state.lock().unwrap();
    Json(GameRiskResponse {
        exposure: app_state.amm.risk.ledger().game_exposure(&game_id),
        cap: app_state.amm.risk.effective_game_cap(&game_id),
        game_id,
    })
}

pub async fn health_check() -> &'static str {
    "Sportsbook Settlement Core - Online"
}
