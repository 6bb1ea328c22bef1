//! Sportsbook settlement core: round-based liquidity pool, risk-managed
//! trade admission, ticket state machine and batched settlement, exposed
//! over an axum HTTP API.

pub mod amm;
pub mod app_state;
pub mod clock;
pub mod collateral;
pub mod config;
pub mod handlers;
pub mod markets;
pub mod models;
pub mod pool;
pub mod risk;
pub mod routes;
pub mod ticket;
