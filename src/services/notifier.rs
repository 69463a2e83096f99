use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use super::Notifier;
use crate::models::{CallSession, CallSummary, RecruiterDecision};

/// Errors that can occur when delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Webhook rejected notification: {0}")]
    Rejected(String),
}

/// Posts decision and summary notifications to an outbound webhook
///
/// The receiving side (mail delivery, candidate inbox) is out of scope.
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn post(&self, body: serde_json::Value) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_decision(
        &self,
        session: &CallSession,
        decision: &RecruiterDecision,
        notes: Option<&str>,
    ) -> Result<(), NotifyError> {
        tracing::debug!("Posting decision notification for session {}", session.id);
        self.post(json!({
            "type": "decision",
            "sessionId": session.id,
            "candidateId": session.candidate_id,
            "recruiterId": session.recruiter_id,
            "decision": decision,
            "notes": notes,
        }))
        .await
    }

    async fn notify_summary(&self, session: &CallSession, summary: &CallSummary) -> Result<(), NotifyError> {
        tracing::debug!("Posting summary notification for session {}", session.id);
        self.post(json!({
            "type": "summary",
            "sessionId": session.id,
            "candidateId": session.candidate_id,
            "recruiterId": session.recruiter_id,
            "summary": summary,
        }))
        .await
    }
}

/// Notifier that only logs; used when no webhook is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_decision(
        &self,
        session: &CallSession,
        decision: &RecruiterDecision,
        _notes: Option<&str>,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            "Decision {:?} recorded for candidate {} in session {}",
            decision.decision,
            session.candidate_id,
            session.id
        );
        Ok(())
    }

    async fn notify_summary(&self, session: &CallSession, summary: &CallSummary) -> Result<(), NotifyError> {
        tracing::info!(
            "Summary attached to session {} (overall {}/10)",
            session.id,
            summary.overall_score
        );
        Ok(())
    }
}
