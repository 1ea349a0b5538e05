//! Startup configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use protocol::GameType;
use service_support::config::{opt_var, parse_var, var_or};
use service_support::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamemasterConfig {
    pub host: String,
    pub port: u16,
    /// Coordinator service base URL; `None` runs against an in-process ensemble.
    pub coordination_url: Option<String>,
    pub session_timeout: Duration,
    /// Host and port published in the service directory.
    pub advertised_host: String,
    pub advertised_port: u16,
    pub handoff_retry: Duration,
    pub handoff_timeout: Duration,
    /// Game types the playmaster fleet can run; others are refused at the door.
    pub hosted_game_types: Vec<GameType>,
}

impl GamemasterConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let host = var_or("GAMEMASTER_HOST", "0.0.0.0");
        let port = parse_var("GAMEMASTER_PORT", 8000u16)?;
        let advertised_host = opt_var("ADVERTISED_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let advertised_port = parse_var("ADVERTISED_PORT", port)?;

        Ok(Self {
            host,
            port,
            coordination_url: opt_var("COORDINATION_URL"),
            session_timeout: Duration::from_millis(parse_var(
                "COORDINATION_SESSION_TIMEOUT_MS",
                10_000u64,
            )?),
            advertised_host,
            advertised_port,
            handoff_retry: Duration::from_millis(parse_var("HANDOFF_RETRY_MS", 2_000u64)?),
            handoff_timeout: Duration::from_millis(parse_var("HANDOFF_TIMEOUT_MS", 5_000u64)?),
            hosted_game_types: hosted_game_types()?,
        })
    }
}

fn hosted_game_types() -> Result<Vec<GameType>, AppError> {
    let raw = var_or("HOSTED_GAME_TYPES", "tic-tac-toe");
    let mut hosted = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let game_type = GameType::from_str(name)
            .map_err(|e| AppError::config(format!("HOSTED_GAME_TYPES='{raw}' is invalid: {e}")))?;
        if !hosted.contains(&game_type) {
            hosted.push(game_type);
        }
    }
    if hosted.is_empty() {
        return Err(AppError::config("HOSTED_GAME_TYPES names no game type"));
    }
    Ok(hosted)
}
