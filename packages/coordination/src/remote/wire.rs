//! JSON bodies exchanged between `RemoteCoordinator` and the coordinator service.

use serde::{Deserialize, Serialize};

use crate::client::{CreateMode, SessionId, Stat, WatchEvent};
use crate::error::CoordError;

/// Node payloads travel base64-encoded.
mod payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: SessionId,
    pub timeout_ms: u64,
}

/// One coordination operation. Watching reads carry a client-chosen watch id
/// so that the event can be matched before the reply is even processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Create {
        path: String,
        #[serde(with = "payload")]
        data: Vec<u8>,
        mode: CreateMode,
    },
    Get {
        path: String,
        #[serde(default)]
        watch: Option<u64>,
    },
    Exists {
        path: String,
        #[serde(default)]
        watch: Option<u64>,
    },
    Set {
        path: String,
        #[serde(with = "payload")]
        data: Vec<u8>,
    },
    Delete {
        path: String,
    },
    Children {
        path: String,
        #[serde(default)]
        watch: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Created {
        path: String,
    },
    Data {
        #[serde(with = "payload")]
        data: Vec<u8>,
        stat: Stat,
    },
    Exists {
        stat: Option<Stat>,
    },
    Stat {
        stat: Stat,
    },
    Deleted,
    Children {
        children: Vec<String>,
    },
}

/// Reply to `POST /sessions/{id}/ops`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationReply {
    Ok(Outcome),
    Err(CoordError),
}

impl From<Result<Outcome, CoordError>> for OperationReply {
    fn from(result: Result<Outcome, CoordError>) -> Self {
        match result {
            Ok(outcome) => Self::Ok(outcome),
            Err(e) => Self::Err(e),
        }
    }
}

impl From<OperationReply> for Result<Outcome, CoordError> {
    fn from(reply: OperationReply) -> Self {
        match reply {
            OperationReply::Ok(outcome) => Ok(outcome),
            OperationReply::Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredWatch {
    pub watch_id: u64,
    pub event: WatchEvent,
}

/// Reply to `GET /sessions/{id}/events`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<FiredWatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_are_base64_strings() {
        let op = Operation::Set {
            path: "/a".to_string(),
            data: b"{\"x\":1}".to_vec(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "set");
        assert_eq!(json["data"], "eyJ4IjoxfQ==");
    }

    #[test]
    fn errors_round_trip_inside_replies() {
        let reply = OperationReply::from(Err(CoordError::no_node("/gone")));
        let text = serde_json::to_string(&reply).unwrap();
        let back: OperationReply = serde_json::from_str(&text).unwrap();
        let result: Result<Outcome, CoordError> = back.into();
        assert_eq!(result, Err(CoordError::no_node("/gone")));
    }
}
