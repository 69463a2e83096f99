use actix_web::{web, HttpResponse, Responder};

use super::AppState;
use crate::error::CoreError;
use crate::models::{FindCandidateResponse, HealthResponse};
use crate::services::Identity;

/// Configure health and matching routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/matching/find-candidate", web::post().to(find_candidate));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.store.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        active_rooms: state.relay().room_count(),
    })
}

/// Best candidate for the calling recruiter, without opening a session
///
/// POST /api/v1/matching/find-candidate
async fn find_candidate(state: web::Data<AppState>, identity: Identity) -> Result<HttpResponse, CoreError> {
    if !identity.is_recruiter() {
        return Err(CoreError::Authorization("only recruiters can search for candidates".into()));
    }

    let best_match = state.engine.find_best_match(&identity.id).await?;
    let message = match &best_match {
        Some(result) => format!("Found candidate {}", result.candidate.id),
        None => "No candidates available at the moment".to_string(),
    };

    Ok(HttpResponse::Ok().json(FindCandidateResponse { best_match, message }))
}
