// Route exports
pub mod calls;
pub mod matching;
pub mod socket;

use actix_web::{error, web, HttpRequest};
use std::sync::Arc;

use crate::core::{MatchingEngine, SessionCoordinator, SignalingRelay};
use crate::models::ErrorResponse;
use crate::services::Store;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: MatchingEngine,
    pub coordinator: SessionCoordinator,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, coordinator: SessionCoordinator) -> Self {
        Self {
            engine: MatchingEngine::new(Arc::clone(&store)),
            coordinator,
            store,
        }
    }

    pub fn relay(&self) -> &Arc<SignalingRelay> {
        self.coordinator.relay()
    }
}

fn bad_request(kind: &str, message: String) -> actix_web::Error {
    let body = ErrorResponse {
        error: kind.to_string(),
        message,
        status_code: 400,
    };
    error::InternalError::from_response(
        body.message.clone(),
        actix_web::HttpResponse::BadRequest().json(body),
    )
    .into()
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    bad_request("invalid_json", format!("Invalid JSON: {}", err))
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    bad_request("invalid_query", format!("Invalid query: {}", err))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matching::configure)
            .configure(calls::configure)
            .configure(socket::configure),
    );
}
