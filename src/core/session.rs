use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::relay::SignalingRelay;
use crate::error::CoreError;
use crate::models::{
    CallSession, CallSummary, Decision, Participant, Priority, RecruiterDecision, ServerMessage, SessionFields,
    SessionStatus,
};
use crate::services::{Notifier, Store};

/// Session lifecycle settings
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Fixed, server-enforced interview length
    pub call_duration: Duration,
    /// Keep ENDED/EXPIRED sessions in the registry instead of evicting them
    pub retain_ended_sessions: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            call_duration: Duration::from_secs(300),
            retain_ended_sessions: false,
        }
    }
}

struct SessionEntry {
    session: CallSession,
    /// Monotonic start used for the duration; client clocks are never consulted
    started_at: Option<Instant>,
    /// Pending auto-end; `None` once the session is terminal
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    relay: Arc<SignalingRelay>,
    settings: SessionSettings,
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<SessionEntry>>>>,
    /// room id -> session id
    rooms: Mutex<HashMap<String, String>>,
}

/// Owns the call-session state machine
///
/// ```text
/// WAITING --(2nd member joins)--> ACTIVE --(end / timer)--> ENDED
///    |                              |
///    +------(external update)-------+--> EXPIRED
/// ```
///
/// Every transition for a session runs under that session's async mutex, so
/// `join`, `end` and the timer callback never interleave. Different sessions
/// do not contend beyond the brief registry lookup.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Move a session to `next` if the lifecycle allows it
fn advance(session: &mut CallSession, next: SessionStatus) -> Result<(), CoreError> {
    if !session.status.can_transition_to(next) {
        return Err(CoreError::State(format!(
            "session {} cannot move from {} to {}",
            session.id, session.status, next
        )));
    }
    session.status = next;
    Ok(())
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        relay: Arc<SignalingRelay>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                notifier,
                relay,
                settings,
                sessions: Mutex::new(HashMap::new()),
                rooms: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn relay(&self) -> &Arc<SignalingRelay> {
        &self.inner.relay
    }

    pub fn call_duration(&self) -> Duration {
        self.inner.settings.call_duration
    }

    fn entry(&self, session_id: &str) -> Option<Arc<tokio::sync::Mutex<SessionEntry>>> {
        guard(&self.inner.sessions).get(session_id).cloned()
    }

    /// Session owning a room, if any
    pub fn session_for_room(&self, room_id: &str) -> Option<String> {
        guard(&self.inner.rooms).get(room_id).cloned()
    }

    /// Sessions currently held in the registry
    pub fn session_count(&self) -> usize {
        guard(&self.inner.sessions).len()
    }

    /// Create a WAITING session and its room
    pub async fn create(&self, candidate_id: &str, recruiter_id: &str) -> Result<CallSession, CoreError> {
        if candidate_id.trim().is_empty() || recruiter_id.trim().is_empty() {
            return Err(CoreError::Validation("candidate and recruiter ids are required".into()));
        }
        if candidate_id == recruiter_id {
            return Err(CoreError::Validation("candidate and recruiter must differ".into()));
        }

        let session = CallSession {
            id: Uuid::new_v4().to_string(),
            candidate_id: candidate_id.to_string(),
            recruiter_id: recruiter_id.to_string(),
            room_id: Uuid::new_v4().to_string(),
            status: SessionStatus::Waiting,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            duration: None,
            decision: None,
            summary: None,
        };

        self.inner.store.create_session(&session).await?;

        self.inner.relay.open_room(&session.room_id);
        guard(&self.inner.rooms).insert(session.room_id.clone(), session.id.clone());
        guard(&self.inner.sessions).insert(
            session.id.clone(),
            Arc::new(tokio::sync::Mutex::new(SessionEntry {
                session: session.clone(),
                started_at: None,
                timer: None,
            })),
        );

        tracing::info!(
            "Created session {} (candidate {}, recruiter {}, room {})",
            session.id,
            candidate_id,
            recruiter_id,
            session.room_id
        );

        Ok(session)
    }

    /// Add a participant's connection to the session room
    ///
    /// The join that brings the room to two members moves WAITING to ACTIVE
    /// and starts the auto-end timer. Later joins never restart it.
    pub async fn join(&self, session_id: &str, identity: &str, connection_id: &str) -> Result<CallSession, CoreError> {
        let Some(entry) = self.entry(session_id) else {
            return Err(self.missing_session(session_id, "join").await);
        };
        let mut entry = entry.lock().await;

        if entry.session.status.is_terminal() {
            return Err(CoreError::State(format!(
                "session {} is {}",
                session_id, entry.session.status
            )));
        }
        if !entry.session.is_participant(identity) {
            return Err(CoreError::Authorization(format!(
                "{} is not a participant of session {}",
                identity, session_id
            )));
        }

        let room_id = entry.session.room_id.clone();
        let duplicate = self
            .inner
            .relay
            .members(&room_id)
            .iter()
            .any(|m| m.identity == identity && m.connection_id != connection_id);
        if duplicate {
            return Err(CoreError::State(format!(
                "{} is already connected to session {}",
                identity, session_id
            )));
        }

        let outcome = self
            .inner
            .relay
            .join(&room_id, Participant::new(identity, connection_id))?;

        if outcome.full && entry.session.status == SessionStatus::Waiting {
            self.activate(&mut entry).await?;
        }

        Ok(entry.session.clone())
    }

    async fn activate(&self, entry: &mut SessionEntry) -> Result<(), CoreError> {
        advance(&mut entry.session, SessionStatus::Active)?;

        let session_id = entry.session.id.clone();
        let start_time = Utc::now();
        let duration = self.inner.settings.call_duration;

        entry.session.start_time = Some(start_time);
        entry.started_at = Some(Instant::now());
        entry.timer = Some(self.spawn_timer(&session_id, duration));

        self.inner.relay.broadcast(
            &entry.session.room_id,
            &ServerMessage::CallStarted {
                session_id: session_id.clone(),
                duration: duration.as_secs(),
            },
        );

        if let Err(e) = self
            .inner
            .store
            .update_session_status(
                &session_id,
                SessionStatus::Active,
                SessionFields {
                    start_time: Some(start_time),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!("Failed to persist start of session {}: {}", session_id, e);
        }

        tracing::info!("Session {} is active for {}s", session_id, duration.as_secs());
        Ok(())
    }

    fn spawn_timer(&self, session_id: &str, duration: Duration) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = inner.upgrade() {
                SessionCoordinator { inner }.on_timer_elapsed(&session_id).await;
            }
        })
    }

    async fn on_timer_elapsed(&self, session_id: &str) {
        let Some(entry) = self.entry(session_id) else {
            return;
        };
        let mut entry = entry.lock().await;

        // Running inside the timer task: detach rather than abort ourselves
        entry.timer.take();

        if entry.session.status != SessionStatus::Active {
            return;
        }

        tracing::info!("Session {} reached its time limit", session_id);
        if let Err(e) = self.finish(&mut entry, SessionStatus::Ended).await {
            tracing::warn!("Timer could not end session {}: {}", session_id, e);
        }
    }

    /// End the session; a no-op when it is already terminal
    pub async fn end(&self, session_id: &str) -> Result<CallSession, CoreError> {
        let Some(entry) = self.entry(session_id) else {
            return match self.inner.store.get_session(session_id).await? {
                Some(session) if session.status.is_terminal() => Ok(session),
                _ => Err(CoreError::State(format!("session {} does not exist", session_id))),
            };
        };
        let mut entry = entry.lock().await;

        if entry.session.status.is_terminal() {
            tracing::debug!("Session {} already {}", session_id, entry.session.status);
            return Ok(entry.session.clone());
        }

        self.finish(&mut entry, SessionStatus::Ended).await
    }

    /// Mark a WAITING or ACTIVE session EXPIRED
    async fn expire(&self, session_id: &str) -> Result<CallSession, CoreError> {
        let Some(entry) = self.entry(session_id) else {
            return match self.inner.store.get_session(session_id).await? {
                Some(session) if session.status == SessionStatus::Expired => Ok(session),
                Some(session) => Err(CoreError::State(format!(
                    "session {} is {} and cannot expire",
                    session_id, session.status
                ))),
                None => Err(CoreError::NotFound(format!("session {}", session_id))),
            };
        };
        let mut entry = entry.lock().await;

        if entry.session.status == SessionStatus::Expired {
            return Ok(entry.session.clone());
        }

        self.finish(&mut entry, SessionStatus::Expired).await
    }

    /// Terminal transition shared by end, timer and expiry
    ///
    /// Rejects moves the lifecycle forbids. Once the move is accepted,
    /// collaborator failures are logged and termination always completes.
    async fn finish(&self, entry: &mut SessionEntry, status: SessionStatus) -> Result<CallSession, CoreError> {
        debug_assert!(status.is_terminal());
        advance(&mut entry.session, status)?;

        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        let end_time = Utc::now();
        let duration = entry.started_at.map_or(0, |started| started.elapsed().as_secs());
        let session_id = entry.session.id.clone();
        let room_id = entry.session.room_id.clone();

        entry.session.end_time = Some(end_time);
        entry.session.duration = Some(duration);

        let notice = match status {
            SessionStatus::Expired => ServerMessage::CallExpired {
                session_id: session_id.clone(),
            },
            _ => ServerMessage::CallEnded {
                session_id: session_id.clone(),
                duration,
            },
        };
        let notified = self.inner.relay.broadcast(&room_id, &notice);
        self.inner.relay.close_room(&room_id);

        if let Err(e) = self
            .inner
            .store
            .update_session_status(
                &session_id,
                status,
                SessionFields {
                    end_time: Some(end_time),
                    duration: Some(duration),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!("Failed to persist {} for session {}: {}", status, session_id, e);
        }

        if !self.inner.settings.retain_ended_sessions {
            guard(&self.inner.sessions).remove(&session_id);
            guard(&self.inner.rooms).remove(&room_id);
        }

        tracing::info!(
            "Session {} {} after {}s ({} member(s) notified)",
            session_id,
            status,
            duration,
            notified
        );

        Ok(entry.session.clone())
    }

    /// Remove a connection from the session room
    ///
    /// Never changes the session status: an ACTIVE call with one member left
    /// keeps running until the timer or an explicit end, and a WAITING session
    /// whose room empties stays WAITING.
    pub async fn leave(&self, session_id: &str, connection_id: &str) -> Result<CallSession, CoreError> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| CoreError::NotFound(format!("session {}", session_id)))?;
        let entry = entry.lock().await;

        let departure = self
            .inner
            .relay
            .leave_room(&entry.session.room_id, connection_id)
            .ok_or_else(|| {
                CoreError::Authorization(format!(
                    "connection {} is not in session {}",
                    connection_id, session_id
                ))
            })?;

        if departure.room_deleted {
            tracing::info!(
                "{} left session {}; room {} is empty, session stays {}",
                departure.participant.identity,
                session_id,
                departure.room_id,
                entry.session.status
            );
        } else {
            tracing::info!(
                "{} left session {} ({} remaining)",
                departure.participant.identity,
                session_id,
                departure.remaining
            );
        }

        Ok(entry.session.clone())
    }

    /// Handle a dropped connection: leave every session room, then every other room
    pub async fn disconnect(&self, connection_id: &str) {
        for room_id in self.inner.relay.rooms_of(connection_id) {
            let Some(session_id) = self.session_for_room(&room_id) else {
                continue;
            };
            if let Err(e) = self.leave(&session_id, connection_id).await {
                tracing::debug!("Disconnect of {} from session {}: {}", connection_id, session_id, e);
            }
        }

        let departures = self.inner.relay.disconnect(connection_id);
        tracing::debug!(
            "Connection {} disconnected ({} ad-hoc room(s) left)",
            connection_id,
            departures.len()
        );
    }

    /// Apply a status update requested from outside the call
    ///
    /// Only terminal statuses can be requested; WAITING and ACTIVE follow room membership.
    pub async fn update_status(&self, session_id: &str, status: SessionStatus) -> Result<CallSession, CoreError> {
        match status {
            SessionStatus::Ended => self.end(session_id).await,
            SessionStatus::Expired => self.expire(session_id).await,
            SessionStatus::Waiting | SessionStatus::Active => Err(CoreError::State(format!(
                "status {} is driven by room membership",
                status
            ))),
        }
    }

    /// Attach a recruiter decision; never affects the session status
    pub async fn record_decision(
        &self,
        session_id: &str,
        recruiter_id: &str,
        decision: Decision,
        notes: Option<String>,
        priority: Option<Priority>,
    ) -> Result<RecruiterDecision, CoreError> {
        let record = RecruiterDecision {
            decision,
            notes,
            priority,
            timestamp: Utc::now(),
        };

        let session = self
            .update_fields(session_id, |session| {
                if session.recruiter_id != recruiter_id {
                    return Err(CoreError::Authorization(format!(
                        "{} is not the recruiter of session {}",
                        recruiter_id, session_id
                    )));
                }
                session.decision = Some(record.clone());
                Ok(SessionFields {
                    decision: Some(record.clone()),
                    ..Default::default()
                })
            })
            .await?;

        self.inner.relay.send_to_identity(
            &session.candidate_id,
            &ServerMessage::DecisionReceived {
                session_id: session.id.clone(),
                decision: record.decision,
                notes: record.notes.clone(),
            },
        );

        let notifier = Arc::clone(&self.inner.notifier);
        let notified = record.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .notify_decision(&session, &notified, notified.notes.as_deref())
                .await
            {
                tracing::warn!("Decision notification for session {} failed: {}", session.id, e);
            }
        });

        tracing::info!("Recorded {:?} decision on session {}", record.decision, session_id);

        Ok(record)
    }

    /// Attach a post-call summary and notify
    pub async fn record_summary(&self, session_id: &str, summary: CallSummary) -> Result<CallSession, CoreError> {
        let scores = [
            summary.communication_score,
            summary.technical_score,
            summary.cultural_fit_score,
            summary.overall_score,
        ];
        if scores.iter().any(|s| !(1..=10).contains(s)) {
            return Err(CoreError::Validation("summary scores must be within 1-10".into()));
        }

        let session = self
            .update_fields(session_id, |session| {
                session.summary = Some(summary.clone());
                Ok(SessionFields {
                    summary: Some(summary.clone()),
                    ..Default::default()
                })
            })
            .await?;

        let notifier = Arc::clone(&self.inner.notifier);
        let snapshot = session.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_summary(&snapshot, &summary).await {
                tracing::warn!("Summary notification for session {} failed: {}", snapshot.id, e);
            }
        });

        Ok(session)
    }

    /// Mutate a session (live or evicted) and persist the returned fields
    async fn update_fields<F>(&self, session_id: &str, apply: F) -> Result<CallSession, CoreError>
    where
        F: FnOnce(&mut CallSession) -> Result<SessionFields, CoreError>,
    {
        match self.entry(session_id) {
            Some(entry) => {
                let mut entry = entry.lock().await;
                let mut session = entry.session.clone();
                let fields = apply(&mut session)?;
                self.inner
                    .store
                    .update_session_status(session_id, session.status, fields)
                    .await?;
                entry.session = session.clone();
                Ok(session)
            }
            None => {
                let mut session = self
                    .inner
                    .store
                    .get_session(session_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("session {}", session_id)))?;
                let fields = apply(&mut session)?;
                self.inner
                    .store
                    .update_session_status(session_id, session.status, fields)
                    .await?;
                Ok(session)
            }
        }
    }

    /// Current snapshot, falling back to the store for evicted sessions
    pub async fn get(&self, session_id: &str) -> Result<CallSession, CoreError> {
        if let Some(entry) = self.entry(session_id) {
            return Ok(entry.lock().await.session.clone());
        }
        self.inner
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("session {}", session_id)))
    }

    /// Whether an auto-end timer is still pending for the session
    pub async fn timer_pending(&self, session_id: &str) -> bool {
        let Some(entry) = self.entry(session_id) else {
            return false;
        };
        let entry = entry.lock().await;
        entry.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Cancel every pending timer; sessions stay in the registry
    pub async fn shutdown(&self) {
        let entries: Vec<_> = guard(&self.inner.sessions).values().cloned().collect();
        let mut cancelled = 0;
        for entry in entries {
            if let Some(timer) = entry.lock().await.timer.take() {
                timer.abort();
                cancelled += 1;
            }
        }
        tracing::info!("Session coordinator shut down ({} timer(s) cancelled)", cancelled);
    }

    async fn missing_session(&self, session_id: &str, action: &str) -> CoreError {
        match self.inner.store.get_session(session_id).await {
            Ok(Some(session)) => CoreError::State(format!(
                "cannot {} session {}: it is {}",
                action, session_id, session.status
            )),
            Ok(None) => CoreError::NotFound(format!("session {}", session_id)),
            Err(e) => e.into(),
        }
    }
}
