use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::domain::{CallSession, Decision, MatchResult};
use crate::models::requests::SignalKind;

/// Events pushed to a connected client, framed as `{"event": "<kebab-name>", ...fields}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    MatchFound {
        session_id: String,
        room_id: String,
        candidate: CandidateBrief,
        match_score: f64,
    },
    IncomingCall {
        session_id: String,
        room_id: String,
        recruiter: RecruiterBrief,
    },
    NoMatchFound {
        message: String,
    },
    JoinedRoom {
        room_id: String,
        connection_id: String,
    },
    JoinedCall {
        session_id: String,
        room_id: String,
    },
    UserJoined {
        room_id: String,
        identity: String,
        connection_id: String,
    },
    UserLeft {
        room_id: String,
        identity: String,
        connection_id: String,
    },
    Offer {
        room_id: String,
        from: String,
        payload: Value,
    },
    Answer {
        room_id: String,
        from: String,
        payload: Value,
    },
    IceCandidate {
        room_id: String,
        from: String,
        payload: Value,
    },
    CallStarted {
        session_id: String,
        /// Fixed interview length in seconds
        duration: u64,
    },
    CallEnded {
        session_id: String,
        duration: u64,
    },
    CallExpired {
        session_id: String,
    },
    DecisionReceived {
        session_id: String,
        decision: Decision,
        notes: Option<String>,
    },
    DecisionSaved {
        session_id: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Wrap a relayed signaling payload
    pub fn signal(kind: SignalKind, room_id: &str, from: &str, payload: Value) -> Self {
        let room_id = room_id.to_string();
        let from = from.to_string();
        match kind {
            SignalKind::Offer => ServerMessage::Offer { room_id, from, payload },
            SignalKind::Answer => ServerMessage::Answer { room_id, from, payload },
            SignalKind::IceCandidate => ServerMessage::IceCandidate { room_id, from, payload },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// Candidate fields revealed to the recruiter on a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateBrief {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub skills: Vec<String>,
    pub experience: u32,
}

impl From<&MatchResult> for CandidateBrief {
    fn from(result: &MatchResult) -> Self {
        Self {
            id: result.candidate.id.clone(),
            display_name: result.candidate.display_name.clone(),
            skills: result.candidate.skills.clone(),
            experience: result.candidate.experience,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruiterBrief {
    pub id: String,
    pub company: String,
}

/// Response for the find-candidate endpoint; `match` is null when nobody qualifies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindCandidateResponse {
    #[serde(rename = "match")]
    pub best_match: Option<MatchResult>,
    pub message: String,
}

/// Response wrapping a session snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: CallSession,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "activeRooms")]
    pub active_rooms: usize,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_started_wire_format() {
        let message = ServerMessage::CallStarted {
            session_id: "s1".into(),
            duration: 300,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "event": "call-started", "sessionId": "s1", "duration": 300 })
        );
    }

    #[test]
    fn test_signal_wraps_kind() {
        let message = ServerMessage::signal(SignalKind::IceCandidate, "r1", "conn-a", json!({ "candidate": "x" }));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["event"], "ice-candidate");
        assert_eq!(value["from"], "conn-a");
        assert_eq!(value["roomId"], "r1");
    }
}
