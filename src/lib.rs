//! Screening core - matching and live-session engine for recruiter screening calls
//!
//! This library matches recruiters against the pool of online candidates using
//! hard and weighted soft constraints, relays WebRTC signaling between the two
//! call participants, and runs the time-boxed call-session state machine.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{MatchingEngine, SessionCoordinator, SessionSettings, SignalingRelay};
pub use error::CoreError;
pub use models::{CallSession, CandidateRecord, ConstraintSet, MatchResult, ServerMessage, SessionStatus};
