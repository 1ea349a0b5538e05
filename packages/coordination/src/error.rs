use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by a coordination backend.
///
/// Callers classify errors rather than match on them: transient errors are
/// retried, benign races are swallowed, connectivity errors halt work until
/// the next reconnection.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordError {
    #[error("node {path} does not exist")]
    NoNode { path: String },
    #[error("node {path} already exists")]
    NodeExists { path: String },
    #[error("node {path} still has children")]
    NotEmpty { path: String },
    #[error("ephemeral node {path} cannot have children")]
    NoChildrenForEphemerals { path: String },
    #[error("invalid path {path:?}: {reason}")]
    BadPath { path: String, reason: String },
    #[error("payload could not be encoded or decoded: {detail}")]
    Codec { detail: String },
    #[error("connection to the coordination service was lost")]
    ConnectionLoss,
    #[error("coordination session expired")]
    SessionExpired,
    #[error("coordination transport failure: {detail}")]
    Transport { detail: String },
}

impl CoordError {
    pub fn no_node(path: impl Into<String>) -> Self {
        Self::NoNode { path: path.into() }
    }

    pub fn node_exists(path: impl Into<String>) -> Self {
        Self::NodeExists { path: path.into() }
    }

    pub fn bad_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn codec(detail: impl ToString) -> Self {
        Self::Codec {
            detail: detail.to_string(),
        }
    }

    /// Retryable with the same payload once the backend answers again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLoss | Self::Transport { .. })
    }

    /// Another party created the node first.
    pub fn is_benign_exists(&self) -> bool {
        matches!(self, Self::NodeExists { .. })
    }

    /// The node vanished underfoot.
    pub fn is_benign_missing(&self) -> bool {
        matches!(self, Self::NoNode { .. })
    }

    /// The session is unusable until the connection is re-established.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLoss | Self::SessionExpired | Self::Transport { .. }
        )
    }
}

impl From<serde_json::Error> for CoordError {
    fn from(e: serde_json::Error) -> Self {
        Self::codec(e)
    }
}
