use actix_web::{web, HttpResponse};
use validator::Validate;

use super::AppState;
use crate::error::CoreError;
use crate::models::{CallSession, DecisionRequest, SessionResponse, SummaryRequest, UpdateStatusRequest};
use crate::services::Identity;

/// Configure call-session routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/calls/{id}", web::get().to(get_call))
        .route("/calls/{id}/status", web::put().to(update_status))
        .route("/calls/{id}/decision", web::post().to(record_decision))
        .route("/calls/{id}/summary", web::post().to(record_summary));
}

async fn participant_session(state: &AppState, session_id: &str, identity: &Identity) -> Result<CallSession, CoreError> {
    let session = state.coordinator.get(session_id).await?;
    if !session.is_participant(&identity.id) {
        return Err(CoreError::Authorization(format!(
            "{} is not a participant of session {}",
            identity.id, session_id
        )));
    }
    Ok(session)
}

/// GET /api/v1/calls/{id}
async fn get_call(
    state: web::Data<AppState>,
    path: web::Path<String>,
    identity: Identity,
) -> Result<HttpResponse, CoreError> {
    let session = participant_session(&state, &path, &identity).await?;
    Ok(HttpResponse::Ok().json(SessionResponse { session }))
}

/// PUT /api/v1/calls/{id}/status
///
/// Request body: `{"status": "ended" | "expired"}`
async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    identity: Identity,
    req: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, CoreError> {
    participant_session(&state, &path, &identity).await?;

    tracing::info!("{} requested status {} for session {}", identity.id, req.status, path);
    let session = state.coordinator.update_status(&path, req.status).await?;

    Ok(HttpResponse::Ok().json(SessionResponse { session }))
}

/// POST /api/v1/calls/{id}/decision
async fn record_decision(
    state: web::Data<AppState>,
    path: web::Path<String>,
    identity: Identity,
    req: web::Json<DecisionRequest>,
) -> Result<HttpResponse, CoreError> {
    req.validate()
        .map_err(|errors| CoreError::Validation(errors.to_string()))?;
    if !identity.is_recruiter() {
        return Err(CoreError::Authorization("only recruiters can record decisions".into()));
    }

    let req = req.into_inner();
    state
        .coordinator
        .record_decision(&path, &identity.id, req.decision, req.notes, req.priority)
        .await?;

    let session = state.coordinator.get(&path).await?;
    Ok(HttpResponse::Ok().json(SessionResponse { session }))
}

/// POST /api/v1/calls/{id}/summary
async fn record_summary(
    state: web::Data<AppState>,
    path: web::Path<String>,
    identity: Identity,
    req: web::Json<SummaryRequest>,
) -> Result<HttpResponse, CoreError> {
    req.validate()
        .map_err(|errors| CoreError::Validation(errors.to_string()))?;

    let session = participant_session(&state, &path, &identity).await?;
    if session.recruiter_id != identity.id {
        return Err(CoreError::Authorization(format!(
            "{} is not the recruiter of session {}",
            identity.id, session.id
        )));
    }

    let session = state
        .coordinator
        .record_summary(&path, req.into_inner().into())
        .await?;

    Ok(HttpResponse::Ok().json(SessionResponse { session }))
}
