//! Outbound hand-off of plays to game-hosting workers.

use std::time::Duration;

use async_trait::async_trait;
use protocol::{CreatePlayRequest, GameType};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("worker answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("worker unreachable: {0}")]
    Transport(String),
}

/// Creates plays on a worker. A worker confirms creation with `201 Created`;
/// anything else leaves the play pending.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn create_play(
        &self,
        worker_url: &str,
        game_type: GameType,
        request: &CreatePlayRequest,
        authorization: Option<&str>,
    ) -> Result<(), HandoffError>;
}

pub struct HttpWorkerClient {
    http: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(timeout: Duration) -> Result<Self, HandoffError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HandoffError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

/// `{worker_url}games/{gametype}/register`; worker URLs end with `/`.
pub fn register_url(worker_url: &str, game_type: GameType) -> String {
    format!(
        "{}/games/{}/register",
        worker_url.trim_end_matches('/'),
        game_type.as_str()
    )
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn create_play(
        &self,
        worker_url: &str,
        game_type: GameType,
        request: &CreatePlayRequest,
        authorization: Option<&str>,
    ) -> Result<(), HandoffError> {
        let mut builder = self.http.post(register_url(worker_url, game_type)).json(request);
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| HandoffError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => Err(HandoffError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
