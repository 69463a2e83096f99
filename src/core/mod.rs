// Core algorithm exports
pub mod constraints;
pub mod matcher;
pub mod relay;
pub mod session;

pub use constraints::{evaluate, evaluate_document, resolve_field};
pub use matcher::MatchingEngine;
pub use relay::{Departure, JoinOutcome, Outbound, SignalingRelay, ROOM_CAPACITY};
pub use session::{SessionCoordinator, SessionSettings};
