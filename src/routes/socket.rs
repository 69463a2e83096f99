use actix_web::{rt, web, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::AppState;
use crate::error::CoreError;
use crate::models::{CandidateBrief, ClientMessage, Decision, Participant, Priority, RecruiterBrief, ServerMessage};
use crate::services::Identity;

/// Configure the WebSocket gateway
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(connect));
}

/// Upgrade an authenticated caller to a WebSocket connection
///
/// GET /api/v1/ws?token=<jwt>
async fn connect(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
    identity: Identity,
) -> actix_web::Result<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;

    let connection = Connection {
        state: state.get_ref().clone(),
        identity,
        connection_id: Uuid::new_v4().to_string(),
    };
    rt::spawn(connection.run(session, stream));

    Ok(response)
}

/// One client connection and its handler table
struct Connection {
    state: AppState,
    identity: Identity,
    connection_id: String,
}

impl Connection {
    async fn run(self, mut session: Session, mut stream: MessageStream) {
        let (tx, mut outbound) = mpsc::unbounded_channel();
        self.state
            .relay()
            .connect(&self.connection_id, &self.identity.id, tx);
        self.set_online(true).await;

        tracing::info!(
            "{} connected as {:?} on {}",
            self.identity.id,
            self.identity.role,
            self.connection_id
        );

        let close_reason = loop {
            tokio::select! {
                inbound = stream.recv() => match inbound {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => break reason,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Protocol error on {}: {}", self.connection_id, e);
                        break None;
                    }
                    None => break None,
                },
                Some(message) = outbound.recv() => {
                    let frame = match serde_json::to_string(&message) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!("Failed to encode outbound frame: {}", e);
                            continue;
                        }
                    };
                    if session.text(frame).await.is_err() {
                        break None;
                    }
                }
            }
        };

        self.state.coordinator.disconnect(&self.connection_id).await;
        self.set_online(false).await;
        let _ = session.close(close_reason).await;

        tracing::info!("{} disconnected from {}", self.identity.id, self.connection_id);
    }

    async fn set_online(&self, online: bool) {
        if let Err(e) = self.state.store.set_online(&self.identity.id, online).await {
            tracing::warn!("Failed to update online status for {}: {}", self.identity.id, e);
        }
    }

    fn reply(&self, message: ServerMessage) {
        self.state.relay().send_to_connection(&self.connection_id, &message);
    }

    async fn dispatch(&self, frame: &str) {
        let message: ClientMessage = match serde_json::from_str(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Malformed frame on {}: {}", self.connection_id, e);
                self.reply(ServerMessage::error(format!("Malformed message: {}", e)));
                return;
            }
        };

        if let Err(e) = self.handle(message).await {
            tracing::debug!("Request on {} failed: {}", self.connection_id, e);
            self.reply(ServerMessage::error(e.to_string()));
        }
    }

    async fn handle(&self, message: ClientMessage) -> Result<(), CoreError> {
        let message = match message.into_signal() {
            Ok((kind, room_id, payload)) => return self.relay_signal(kind, room_id, payload),
            Err(other) => other,
        };

        match message {
            ClientMessage::JoinRoom { room_id, identity } => self.join_room(room_id, identity).await,
            ClientMessage::FindMatch { company } => self.find_match(company).await,
            ClientMessage::JoinCall { session_id, room_id } => self.join_call(session_id, room_id).await,
            ClientMessage::LeaveCall { session_id } => {
                self.state
                    .coordinator
                    .leave(&session_id, &self.connection_id)
                    .await?;
                Ok(())
            }
            ClientMessage::EndCall { session_id } => self.end_call(session_id).await,
            ClientMessage::RecruiterDecision {
                session_id,
                decision,
                notes,
                priority,
            } => self.record_decision(session_id, decision, notes, priority).await,
            ClientMessage::Offer { .. } | ClientMessage::Answer { .. } | ClientMessage::IceCandidate { .. } => {
                Ok(())
            }
        }
    }

    /// Forward to the named room, or to every room this connection is in
    fn relay_signal(
        &self,
        kind: crate::models::SignalKind,
        room_id: Option<String>,
        payload: serde_json::Value,
    ) -> Result<(), CoreError> {
        let relay = self.state.relay();
        let rooms = match room_id {
            Some(room_id) => vec![room_id],
            None => relay.rooms_of(&self.connection_id),
        };
        if rooms.is_empty() {
            return Err(CoreError::State("join a room before signaling".into()));
        }

        for room_id in rooms {
            relay.relay(kind, payload.clone(), &room_id, &self.connection_id)?;
        }
        Ok(())
    }

    async fn join_room(&self, room_id: String, identity: Option<String>) -> Result<(), CoreError> {
        if identity.as_deref().is_some_and(|claimed| claimed != self.identity.id) {
            return Err(CoreError::Authorization("identity does not match the connection".into()));
        }

        match self.state.coordinator.session_for_room(&room_id) {
            Some(session_id) => {
                self.state
                    .coordinator
                    .join(&session_id, &self.identity.id, &self.connection_id)
                    .await?;
            }
            None => {
                self.state
                    .relay()
                    .join(&room_id, Participant::new(&self.identity.id, &self.connection_id))?;
            }
        }

        self.reply(ServerMessage::JoinedRoom {
            room_id,
            connection_id: self.connection_id.clone(),
        });
        Ok(())
    }

    /// Match the calling recruiter, open a session and ring the candidate
    async fn find_match(&self, company: Option<String>) -> Result<(), CoreError> {
        if !self.identity.is_recruiter() {
            return Err(CoreError::Authorization("only recruiters can search for candidates".into()));
        }

        let Some(result) = self.state.engine.find_best_match(&self.identity.id).await? else {
            self.reply(ServerMessage::NoMatchFound {
                message: "No candidates available at the moment".into(),
            });
            return Ok(());
        };

        let session = self
            .state
            .coordinator
            .create(&result.candidate.id, &self.identity.id)
            .await?;

        self.reply(ServerMessage::MatchFound {
            session_id: session.id.clone(),
            room_id: session.room_id.clone(),
            candidate: CandidateBrief::from(&result),
            match_score: result.soft_score,
        });

        let rung = self.state.relay().send_to_identity(
            &session.candidate_id,
            &ServerMessage::IncomingCall {
                session_id: session.id.clone(),
                room_id: session.room_id.clone(),
                recruiter: RecruiterBrief {
                    id: self.identity.id.clone(),
                    company: company.unwrap_or_else(|| "Unknown company".to_string()),
                },
            },
        );
        if rung == 0 {
            tracing::warn!("Candidate {} has no open connection for session {}", session.candidate_id, session.id);
        }

        Ok(())
    }

    async fn join_call(&self, session_id: String, room_id: String) -> Result<(), CoreError> {
        let session = self.state.coordinator.get(&session_id).await?;
        if session.room_id != room_id {
            return Err(CoreError::Validation(format!(
                "room {} does not belong to session {}",
                room_id, session_id
            )));
        }

        self.state
            .coordinator
            .join(&session_id, &self.identity.id, &self.connection_id)
            .await?;

        self.reply(ServerMessage::JoinedCall { session_id, room_id });
        Ok(())
    }

    async fn end_call(&self, session_id: String) -> Result<(), CoreError> {
        let session = self.state.coordinator.get(&session_id).await?;
        if !session.is_participant(&self.identity.id) {
            return Err(CoreError::Authorization(format!(
                "{} is not a participant of session {}",
                self.identity.id, session_id
            )));
        }

        self.state.coordinator.end(&session_id).await?;
        Ok(())
    }

    async fn record_decision(
        &self,
        session_id: String,
        decision: Decision,
        notes: Option<String>,
        priority: Option<Priority>,
    ) -> Result<(), CoreError> {
        if !self.identity.is_recruiter() {
            return Err(CoreError::Authorization("only recruiters can record decisions".into()));
        }

        self.state
            .coordinator
            .record_decision(&session_id, &self.identity.id, decision, notes, priority)
            .await?;

        self.reply(ServerMessage::DecisionSaved { session_id });
        Ok(())
    }
}
