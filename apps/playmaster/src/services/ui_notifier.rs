//! Push of game state changes to the UI services watching a play.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::debug;

use super::gamemaster_client::endpoint;

/// Delivery is best effort; failures are logged by the implementation.
#[async_trait]
pub trait UiNotifier: Send + Sync {
    async fn notify(&self, ui_url: &str, update: &Value, authorization: Option<&str>);
}

pub struct HttpUiNotifier {
    http: reqwest::Client,
}

impl HttpUiNotifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl UiNotifier for HttpUiNotifier {
    async fn notify(&self, ui_url: &str, update: &Value, authorization: Option<&str>) {
        let mut builder = self.http.post(endpoint(ui_url, "games/update")).json(update);
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        match builder.send().await {
            Ok(response) if !response.status().is_success() => {
                debug!(ui_url, status = response.status().as_u16(), "UI refused game update");
            }
            Ok(_) => {}
            Err(e) => debug!(ui_url, error = %e, "UI unreachable for game update"),
        }
    }
}
