// Request/response models for the settlement API

use serde::{Deserialize, Serialize};

/// Uniform error body; every failed endpoint answers with this.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

// ===== TRADING =====

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub total_quote: f64,
    pub payout: f64,
    pub fee: f64,
    pub bound_round: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TradeResponse {
    pub success: bool,
    pub ticket_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExerciseResponse {
    pub success: bool,
    pub winner: bool,
    pub pay_out: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRequest {
    pub caller: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub refund: f64,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub success: bool,
    pub expired: usize,
}

// ===== POOL =====

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub user: String,
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositResponse {
    pub success: bool,
    pub round: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalRequestBody {
    pub user: String,
    /// Absent = full withdrawal; present = partial share in (0.1, 0.9)
    #[serde(default)]
    pub share: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub processed: usize,
}

#[derive(Debug, Serialize)]
pub struct PrepareCloseResponse {
    pub success: bool,
    pub profit_and_loss: f64,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub success: bool,
    pub next_round: u32,
}

// ===== RESULTS & RISK =====

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsRequest {
    pub game_ids: Vec<String>,
    pub type_ids: Vec<u16>,
    pub player_ids: Vec<u32>,
    pub winning_positions: Vec<Vec<usize>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub success: bool,
    pub newly_set: usize,
}

#[derive(Debug, Serialize)]
pub struct GameRiskResponse {
    pub game_id: String,
    pub exposure: f64,
    pub cap: f64,
}
