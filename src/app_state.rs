// Application state management

use crate::amm::Amm;
use crate::config::{PoolConfig, RiskConfig};
use std::sync::{Arc, Mutex};

pub type SharedState = Arc<Mutex<AppState>>;

pub struct AppState {
    pub amm: Amm,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            amm: Amm::new(RiskConfig::from_env(), PoolConfig::from_env()),
        }
    }

    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
