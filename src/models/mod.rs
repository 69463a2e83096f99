// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Availability, CallSession, CallSummary, CandidateFilter, CandidateRecord, Constraint, ConstraintSet, Decision,
    MatchResult, Participant, Predicate, Priority, RecruiterDecision, Role, SessionFields, SessionStatus,
    SoftConstraint,
};
pub use requests::{ClientMessage, DecisionRequest, SignalKind, SummaryRequest, UpdateStatusRequest};
pub use responses::{
    CandidateBrief, ErrorResponse, FindCandidateResponse, HealthResponse, RecruiterBrief, ServerMessage,
    SessionResponse,
};
