//! Outbound reports to the gamemaster.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use protocol::{HostOwnership, PlayResultReport};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("gamemaster location unknown")]
    NoGamemaster,
    #[error("gamemaster answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("gamemaster unreachable: {0}")]
    Transport(String),
}

impl ReportError {
    /// Worth retrying later: the gamemaster may come back or move.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoGamemaster | Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

#[async_trait]
pub trait GamemasterClient: Send + Sync {
    /// `POST plays/result`; accepted with `201 Created`.
    async fn report_result(&self, report: &PlayResultReport) -> Result<(), ReportError>;

    /// `POST plays/host`.
    async fn report_host_ownership(&self, ownership: &HostOwnership) -> Result<(), ReportError>;
}

/// Where the gamemaster currently lives, kept current by the directory watch.
#[derive(Debug, Clone, Default)]
pub struct GamemasterUrl(Arc<RwLock<Option<String>>>);

impl GamemasterUrl {
    pub fn get(&self) -> Option<String> {
        self.0.read().clone()
    }

    pub fn set(&self, url: Option<String>) {
        *self.0.write() = url;
    }
}

pub struct HttpGamemasterClient {
    http: reqwest::Client,
    url: GamemasterUrl,
}

impl HttpGamemasterClient {
    pub fn new(url: GamemasterUrl, timeout: Duration) -> Result<Self, ReportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        Ok(Self { http, url })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
        accepted: StatusCode,
    ) -> Result<(), ReportError> {
        let base = self.url.get().ok_or(ReportError::NoGamemaster)?;
        let response = self
            .http
            .post(endpoint(&base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        if response.status() == accepted {
            return Ok(());
        }
        Err(ReportError::Rejected {
            status: response.status().as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

/// `{base}{path}`; directory URLs end with `/`.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[async_trait]
impl GamemasterClient for HttpGamemasterClient {
    async fn report_result(&self, report: &PlayResultReport) -> Result<(), ReportError> {
        self.post("plays/result", report, StatusCode::CREATED).await
    }

    async fn report_host_ownership(&self, ownership: &HostOwnership) -> Result<(), ReportError> {
        self.post("plays/host", ownership, StatusCode::OK).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_the_directory_url() {
        assert_eq!(
            endpoint("http://10.0.0.1:8000/gamemaster/", "plays/result"),
            "http://10.0.0.1:8000/gamemaster/plays/result"
        );
        assert_eq!(endpoint("http://gm", "/plays/host"), "http://gm/plays/host");
    }

    #[test]
    fn only_server_side_failures_are_retried() {
        assert!(ReportError::NoGamemaster.is_retryable());
        assert!(ReportError::Transport("refused".into()).is_retryable());
        assert!(ReportError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(!ReportError::Rejected { status: 404, body: String::new() }.is_retryable());
    }

    #[tokio::test]
    async fn reports_wait_for_a_known_gamemaster() {
        let url = GamemasterUrl::default();
        let client = HttpGamemasterClient::new(url.clone(), Duration::from_secs(1)).unwrap();
        let report = PlayResultReport {
            play_id: 1,
            winner_id: Some(2),
            is_draw: false,
        };
        assert_eq!(client.report_result(&report).await, Err(ReportError::NoGamemaster));
    }
}
