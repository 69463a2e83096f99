use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::domain::{CallSummary, Decision, Priority, SessionStatus};

/// Kinds of WebRTC signaling metadata the relay forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Frames sent by a connected client, `{"event": "<kebab-name>", ...fields}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room_id: String,
        #[serde(default)]
        identity: Option<String>,
    },
    Offer {
        #[serde(default)]
        room_id: Option<String>,
        payload: Value,
    },
    Answer {
        #[serde(default)]
        room_id: Option<String>,
        payload: Value,
    },
    IceCandidate {
        #[serde(default)]
        room_id: Option<String>,
        payload: Value,
    },
    FindMatch {
        #[serde(default)]
        company: Option<String>,
    },
    JoinCall {
        session_id: String,
        room_id: String,
    },
    LeaveCall {
        session_id: String,
    },
    EndCall {
        session_id: String,
    },
    RecruiterDecision {
        session_id: String,
        decision: Decision,
        #[serde(default)]
        notes: Option<String>,
        #[serde(default)]
        priority: Option<Priority>,
    },
}

impl ClientMessage {
    /// Split a signaling frame into kind, optional room and payload
    pub fn into_signal(self) -> Result<(SignalKind, Option<String>, Value), ClientMessage> {
        match self {
            ClientMessage::Offer { room_id, payload } => Ok((SignalKind::Offer, room_id, payload)),
            ClientMessage::Answer { room_id, payload } => Ok((SignalKind::Answer, room_id, payload)),
            ClientMessage::IceCandidate { room_id, payload } => Ok((SignalKind::IceCandidate, room_id, payload)),
            other => Err(other),
        }
    }
}

/// Request to update a session status from outside the call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: SessionStatus,
}

/// Request to record a recruiter decision
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[validate(length(max = 4000))]
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// Request to attach a post-call summary
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SummaryRequest {
    #[serde(rename = "candidateStrengths", default)]
    pub candidate_strengths: Vec<String>,
    #[serde(rename = "candidateWeaknesses", default)]
    pub candidate_weaknesses: Vec<String>,
    #[serde(rename = "keySkills", default)]
    pub key_skills: Vec<String>,
    #[validate(range(min = 1, max = 10))]
    #[serde(rename = "communicationScore")]
    pub communication_score: u8,
    #[validate(range(min = 1, max = 10))]
    #[serde(rename = "technicalScore")]
    pub technical_score: u8,
    #[validate(range(min = 1, max = 10))]
    #[serde(rename = "culturalFitScore")]
    pub cultural_fit_score: u8,
    #[validate(range(min = 1, max = 10))]
    #[serde(rename = "overallScore")]
    pub overall_score: u8,
    #[validate(length(min = 1))]
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl From<SummaryRequest> for CallSummary {
    fn from(req: SummaryRequest) -> Self {
        CallSummary {
            candidate_strengths: req.candidate_strengths,
            candidate_weaknesses: req.candidate_weaknesses,
            key_skills: req.key_skills,
            communication_score: req.communication_score,
            technical_score: req.technical_score,
            cultural_fit_score: req.cultural_fit_score,
            overall_score: req.overall_score,
            summary: req.summary,
            recommendations: req.recommendations,
        }
    }
}
