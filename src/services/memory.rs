use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{Store, StoreError};
use crate::models::{CallSession, CandidateFilter, CandidateRecord, ConstraintSet, SessionFields, SessionStatus};

#[derive(Default)]
struct Tables {
    /// Insertion order is the pool fetch order
    candidates: Vec<CandidateRecord>,
    recruiters: HashMap<String, Option<ConstraintSet>>,
    sessions: HashMap<String, CallSession>,
    online: HashSet<String>,
}

/// In-process store used when no database is configured, and in tests
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a candidate, keeping its original position
    pub fn add_candidate(&self, candidate: CandidateRecord) {
        let mut tables = self.tables();
        match tables.candidates.iter_mut().find(|c| c.id == candidate.id) {
            Some(existing) => *existing = candidate,
            None => tables.candidates.push(candidate),
        }
    }

    pub fn add_recruiter(&self, recruiter_id: &str, constraints: Option<ConstraintSet>) {
        self.tables().recruiters.insert(recruiter_id.to_string(), constraints);
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.tables().online.contains(identity)
    }

    pub fn session_count(&self) -> usize {
        self.tables().sessions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_candidate_pool(&self, filter: &CandidateFilter) -> Result<Vec<CandidateRecord>, StoreError> {
        Ok(self
            .tables()
            .candidates
            .iter()
            .filter(|c| filter.accepts(c))
            .cloned()
            .collect())
    }

    async fn get_constraint_set(&self, recruiter_id: &str) -> Result<Option<ConstraintSet>, StoreError> {
        self.tables()
            .recruiters
            .get(recruiter_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("recruiter {}", recruiter_id)))
    }

    async fn create_session(&self, session: &CallSession) -> Result<(), StoreError> {
        self.tables().sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        fields: SessionFields,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", id)))?;

        session.status = status;
        if fields.start_time.is_some() {
            session.start_time = fields.start_time;
        }
        if fields.end_time.is_some() {
            session.end_time = fields.end_time;
        }
        if fields.duration.is_some() {
            session.duration = fields.duration;
        }
        if fields.decision.is_some() {
            session.decision = fields.decision;
        }
        if fields.summary.is_some() {
            session.summary = fields.summary;
        }
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<CallSession>, StoreError> {
        Ok(self.tables().sessions.get(id).cloned())
    }

    async fn set_online(&self, identity: &str, online: bool) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if online {
            tables.online.insert(identity.to_string());
        } else {
            tables.online.remove(identity);
        }
        if let Some(candidate) = tables.candidates.iter_mut().find(|c| c.id == identity) {
            candidate.is_online = online;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Availability;
    use chrono::Utc;

    fn candidate(id: &str, availability: Availability, online: bool) -> CandidateRecord {
        CandidateRecord {
            id: id.into(),
            display_name: None,
            skills: vec![],
            experience: 2,
            location: "Lisbon".into(),
            availability,
            is_online: online,
            attributes: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_pool_keeps_insertion_order_and_filters() {
        let store = MemoryStore::new();
        store.add_candidate(candidate("b", Availability::Available, true));
        store.add_candidate(candidate("a", Availability::Available, true));
        store.add_candidate(candidate("c", Availability::Busy, true));
        store.add_candidate(candidate("d", Availability::Available, false));

        let pool = store.get_candidate_pool(&CandidateFilter::eligible()).await.unwrap();
        let ids: Vec<&str> = pool.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_set_online_updates_candidate() {
        let store = MemoryStore::new();
        store.add_candidate(candidate("a", Availability::Available, false));

        store.set_online("a", true).await.unwrap();
        assert!(store.is_online("a"));
        assert_eq!(store.get_candidate_pool(&CandidateFilter::eligible()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let session = CallSession {
            id: "s1".into(),
            candidate_id: "c".into(),
            recruiter_id: "r".into(),
            room_id: "room".into(),
            status: SessionStatus::Waiting,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            duration: None,
            decision: None,
            summary: None,
        };
        store.create_session(&session).await.unwrap();

        let started = Utc::now();
        store
            .update_session_status(
                "s1",
                SessionStatus::Active,
                SessionFields {
                    start_time: Some(started),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_session_status(
                "s1",
                SessionStatus::Ended,
                SessionFields {
                    duration: Some(42),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Ended);
        assert_eq!(stored.start_time, Some(started));
        assert_eq!(stored.duration, Some(42));
    }

    #[tokio::test]
    async fn test_unknown_session_update_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_session_status("nope", SessionStatus::Ended, SessionFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
