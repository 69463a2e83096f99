use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::CoreError;

/// Candidate availability as stored on the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Busy,
    Unavailable,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Busy => "busy",
            Availability::Unavailable => "unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Availability::Available),
            "busy" => Some(Availability::Busy),
            "unavailable" => Some(Availability::Unavailable),
            _ => None,
        }
    }
}

/// Snapshot of a candidate profile, immutable for the duration of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Years of experience
    pub experience: u32,
    #[serde(default)]
    pub location: String,
    pub availability: Availability,
    #[serde(rename = "isOnline", default)]
    pub is_online: bool,
    /// Free-form nested profile attributes, addressable as `attributes.<key>...`
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, Value>,
}

/// Filter passed to the persistence layer when fetching a candidate pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    pub availability: Option<Availability>,
    pub online: Option<bool>,
}

impl CandidateFilter {
    /// Pool eligible for matching: available and online
    pub fn eligible() -> Self {
        Self {
            availability: Some(Availability::Available),
            online: Some(true),
        }
    }

    pub fn accepts(&self, candidate: &CandidateRecord) -> bool {
        self.availability.map_or(true, |a| candidate.availability == a)
            && self.online.map_or(true, |o| candidate.is_online == o)
    }
}

/// Comparison applied to a resolved candidate field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(Value),
    Contains(Value),
    GreaterThan(Value),
    LessThan(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Operator name not understood; never passes
    Unsupported(String),
}

impl Predicate {
    pub fn operator(&self) -> &str {
        match self {
            Predicate::Equals(_) => "equals",
            Predicate::Contains(_) => "contains",
            Predicate::GreaterThan(_) => "greater_than",
            Predicate::LessThan(_) => "less_than",
            Predicate::In(_) => "in",
            Predicate::NotIn(_) => "not_in",
            Predicate::Unsupported(op) => op,
        }
    }

    fn parse(operator: &str, value: Value) -> Result<Self, CoreError> {
        Ok(match operator {
            "equals" => Predicate::Equals(value),
            "contains" => Predicate::Contains(value),
            "greater_than" => Predicate::GreaterThan(value),
            "less_than" => Predicate::LessThan(value),
            "in" | "not_in" => {
                let Value::Array(items) = value else {
                    return Err(CoreError::Validation(format!(
                        "operator '{}' requires a list value",
                        operator
                    )));
                };
                if operator == "in" {
                    Predicate::In(items)
                } else {
                    Predicate::NotIn(items)
                }
            }
            other => Predicate::Unsupported(other.to_string()),
        })
    }

    fn value(&self) -> Value {
        match self {
            Predicate::Equals(v)
            | Predicate::Contains(v)
            | Predicate::GreaterThan(v)
            | Predicate::LessThan(v) => v.clone(),
            Predicate::In(items) | Predicate::NotIn(items) => Value::Array(items.clone()),
            Predicate::Unsupported(_) => Value::Null,
        }
    }
}

/// Wire shape of a constraint: `{field, operator, value[, weight]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConstraint {
    field: String,
    operator: String,
    #[serde(default)]
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
}

/// A predicate over one (possibly dotted) candidate field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint", into = "RawConstraint")]
pub struct Constraint {
    pub field: String,
    pub predicate: Predicate,
}

impl Constraint {
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            field: field.into(),
            predicate,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.field,
            self.predicate.operator(),
            display_value(&self.predicate.value())
        )
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

impl TryFrom<RawConstraint> for Constraint {
    type Error = CoreError;

    fn try_from(raw: RawConstraint) -> Result<Self, Self::Error> {
        if raw.field.trim().is_empty() {
            return Err(CoreError::Validation("constraint field must not be empty".into()));
        }
        Ok(Self {
            predicate: Predicate::parse(&raw.operator, raw.value)?,
            field: raw.field,
        })
    }
}

impl From<Constraint> for RawConstraint {
    fn from(constraint: Constraint) -> Self {
        RawConstraint {
            operator: constraint.predicate.operator().to_string(),
            value: constraint.predicate.value(),
            field: constraint.field,
            weight: None,
        }
    }
}

/// A weighted constraint contributing to the soft score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint", into = "RawConstraint")]
pub struct SoftConstraint {
    pub constraint: Constraint,
    pub weight: f64,
}

impl SoftConstraint {
    pub fn new(field: impl Into<String>, predicate: Predicate, weight: f64) -> Self {
        Self {
            constraint: Constraint::new(field, predicate),
            weight,
        }
    }
}

impl TryFrom<RawConstraint> for SoftConstraint {
    type Error = CoreError;

    fn try_from(mut raw: RawConstraint) -> Result<Self, Self::Error> {
        let weight = raw
            .weight
            .take()
            .ok_or_else(|| CoreError::Validation(format!("soft constraint on '{}' has no weight", raw.field)))?;
        Ok(Self {
            constraint: Constraint::try_from(raw)?,
            weight,
        })
    }
}

impl From<SoftConstraint> for RawConstraint {
    fn from(soft: SoftConstraint) -> Self {
        let mut raw = RawConstraint::from(soft.constraint);
        raw.weight = Some(soft.weight);
        raw
    }
}

/// A recruiter's matching rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(rename = "hardConstraints", default)]
    pub hard_constraints: Vec<Constraint>,
    #[serde(rename = "softConstraints", default)]
    pub soft_constraints: Vec<SoftConstraint>,
    #[serde(rename = "softConstraintThreshold", alias = "softThreshold")]
    pub soft_threshold: f64,
}

impl ConstraintSet {
    /// Check threshold and weights are within [0, 1]
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.soft_threshold) {
            return Err(CoreError::Validation(format!(
                "soft threshold {} must be within [0, 1]",
                self.soft_threshold
            )));
        }
        for soft in &self.soft_constraints {
            if !(0.0..=1.0).contains(&soft.weight) {
                return Err(CoreError::Validation(format!(
                    "weight {} on '{}' must be within [0, 1]",
                    soft.weight, soft.constraint.field
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of evaluating one candidate against a constraint set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate: CandidateRecord,
    /// Also false when the soft threshold is missed
    #[serde(rename = "passedHardConstraints")]
    pub passed_hard_constraints: bool,
    #[serde(rename = "softScore")]
    pub soft_score: f64,
    pub reasons: Vec<String>,
}

/// Lifecycle of a screening call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Ended,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(SessionStatus::Waiting),
            "active" => Some(SessionStatus::Active),
            "ended" => Some(SessionStatus::Ended),
            "expired" => Some(SessionStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Expired)
    }

    /// Status only moves forward: WAITING -> ACTIVE -> ENDED, WAITING|ACTIVE -> EXPIRED
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Waiting, Active) | (Waiting, Ended) | (Active, Ended) | (Waiting, Expired) | (Active, Expired)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Yes,
    No,
    Maybe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Recruiter verdict attached to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruiterDecision {
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub timestamp: DateTime<Utc>,
}

/// Post-call summary produced outside this service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    #[serde(rename = "candidateStrengths", default)]
    pub candidate_strengths: Vec<String>,
    #[serde(rename = "candidateWeaknesses", default)]
    pub candidate_weaknesses: Vec<String>,
    #[serde(rename = "keySkills", default)]
    pub key_skills: Vec<String>,
    #[serde(rename = "communicationScore")]
    pub communication_score: u8,
    #[serde(rename = "technicalScore")]
    pub technical_score: u8,
    #[serde(rename = "culturalFitScore")]
    pub cultural_fit_score: u8,
    #[serde(rename = "overallScore")]
    pub overall_score: u8,
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// One candidate/recruiter screening call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub id: String,
    #[serde(rename = "candidateId")]
    pub candidate_id: String,
    #[serde(rename = "recruiterId")]
    pub recruiter_id: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub status: SessionStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between start and end
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(rename = "recruiterDecision", default)]
    pub decision: Option<RecruiterDecision>,
    #[serde(rename = "aiSummary", default)]
    pub summary: Option<CallSummary>,
}

impl CallSession {
    pub fn is_participant(&self, identity: &str) -> bool {
        self.candidate_id == identity || self.recruiter_id == identity
    }
}

/// Partial update applied alongside a status change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFields {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<u64>,
    pub decision: Option<RecruiterDecision>,
    pub summary: Option<CallSummary>,
}

/// Role carried by an authenticated identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
}

/// A connection's membership in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    #[serde(rename = "connectionId")]
    pub connection_id: String,
    #[serde(rename = "joinedAt")]
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(identity: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            connection_id: connection_id.into(),
            joined_at: Utc::now(),
        }
    }
}
