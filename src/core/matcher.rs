use serde_json::json;
use std::sync::Arc;

use crate::core::constraints::{candidate_document, evaluate_document};
use crate::error::CoreError;
use crate::models::{
    CandidateFilter, CandidateRecord, Constraint, ConstraintSet, MatchResult, Predicate, SoftConstraint,
};
use crate::services::Store;

/// Constraint-based candidate ranking
///
/// # Pipeline
/// 1. Fetch the eligible pool (available & online) and the recruiter's constraint set
/// 2. Evaluate hard constraints, then soft constraints, per candidate
/// 3. Drop candidates that failed hard constraints or the soft threshold
/// 4. Stable sort by soft score, descending
///
/// Nothing is cached: pool and constraints are refetched on every call.
#[derive(Clone)]
pub struct MatchingEngine {
    store: Arc<dyn Store>,
}

impl MatchingEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Baseline constraints for recruiters that have not configured any
    pub fn default_constraint_set() -> ConstraintSet {
        ConstraintSet {
            hard_constraints: vec![
                Constraint::new("availability", Predicate::Equals(json!("available"))),
                Constraint::new("isOnline", Predicate::Equals(json!(true))),
            ],
            soft_constraints: vec![
                SoftConstraint::new("skills", Predicate::Contains(json!("JavaScript")), 0.3),
                SoftConstraint::new("experience", Predicate::GreaterThan(json!(1)), 0.2),
                SoftConstraint::new("location", Predicate::Contains(json!("Remote")), 0.1),
            ],
            soft_threshold: 0.3,
        }
    }

    /// Evaluate one candidate against a constraint set
    ///
    /// Soft constraints are scored even when a hard constraint fails. Missing
    /// the soft threshold also clears `passed_hard_constraints`.
    pub fn evaluate_candidate(candidate: &CandidateRecord, constraints: &ConstraintSet) -> MatchResult {
        let document = candidate_document(candidate);
        let mut reasons = Vec::with_capacity(
            constraints.hard_constraints.len() + constraints.soft_constraints.len() + 1,
        );
        let mut passed_hard_constraints = true;
        let mut soft_score = 0.0;

        for constraint in &constraints.hard_constraints {
            if evaluate_document(&document, constraint) {
                reasons.push(format!("Passed hard constraint: {}", constraint));
            } else {
                passed_hard_constraints = false;
                reasons.push(format!("Failed hard constraint: {}", constraint));
            }
        }

        for soft in &constraints.soft_constraints {
            if evaluate_document(&document, &soft.constraint) {
                soft_score += soft.weight;
                reasons.push(format!(
                    "Passed soft constraint: {} (weight: {})",
                    soft.constraint.field, soft.weight
                ));
            } else {
                reasons.push(format!("Failed soft constraint: {}", soft.constraint));
            }
        }

        if soft_score < constraints.soft_threshold {
            passed_hard_constraints = false;
            reasons.push(format!(
                "Soft constraint threshold not met: {}/{}",
                soft_score, constraints.soft_threshold
            ));
        }

        MatchResult {
            candidate: candidate.clone(),
            passed_hard_constraints,
            soft_score,
            reasons,
        }
    }

    /// Evaluate a pool and return accepted candidates, best first
    ///
    /// Ties keep pool order.
    pub fn rank(pool: &[CandidateRecord], constraints: &ConstraintSet) -> Vec<MatchResult> {
        let mut accepted: Vec<MatchResult> = pool
            .iter()
            .map(|candidate| Self::evaluate_candidate(candidate, constraints))
            .filter(|result| result.passed_hard_constraints)
            .collect();

        // sort_by is stable
        accepted.sort_by(|a, b| {
            b.soft_score
                .partial_cmp(&a.soft_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        accepted
    }

    /// Pick the single best candidate for a recruiter
    ///
    /// An empty pool or no accepted candidate is `Ok(None)`; an unknown
    /// recruiter is `NotFound`.
    pub async fn find_best_match(&self, recruiter_id: &str) -> Result<Option<MatchResult>, CoreError> {
        let constraints = match self.store.get_constraint_set(recruiter_id).await? {
            Some(set) => {
                set.validate()?;
                set
            }
            None => {
                tracing::debug!("Recruiter {} has no constraint set, using defaults", recruiter_id);
                Self::default_constraint_set()
            }
        };

        let pool = self.store.get_candidate_pool(&CandidateFilter::eligible()).await?;
        if pool.is_empty() {
            tracing::info!("No eligible candidates online for recruiter {}", recruiter_id);
            return Ok(None);
        }

        let total = pool.len();
        let best = Self::rank(&pool, &constraints).into_iter().next();

        match &best {
            Some(result) => tracing::info!(
                "Best match for recruiter {}: candidate {} (score {}, pool {})",
                recruiter_id,
                result.candidate.id,
                result.soft_score,
                total
            ),
            None => tracing::info!(
                "No candidate passed constraints for recruiter {} (pool {})",
                recruiter_id,
                total
            ),
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Availability;
    use crate::services::MemoryStore;

    fn create_candidate(id: &str, skills: &[&str], experience: u32, availability: Availability) -> CandidateRecord {
        CandidateRecord {
            id: id.to_string(),
            display_name: Some(format!("Candidate {}", id)),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience,
            location: "Remote".to_string(),
            availability,
            is_online: true,
            attributes: Default::default(),
        }
    }

    fn js_constraints(threshold: f64) -> ConstraintSet {
        ConstraintSet {
            hard_constraints: vec![Constraint::new("availability", Predicate::Equals(json!("available")))],
            soft_constraints: vec![SoftConstraint::new("skills", Predicate::Contains(json!("JS")), 0.5)],
            soft_threshold: threshold,
        }
    }

    #[test]
    fn test_hard_failure_disqualifies() {
        let candidate = create_candidate("1", &["JS"], 3, Availability::Busy);
        let result = MatchingEngine::evaluate_candidate(&candidate, &js_constraints(0.0));

        assert!(!result.passed_hard_constraints);
        // soft constraints still scored
        assert_eq!(result.soft_score, 0.5);
        assert!(result.reasons[0].starts_with("Failed hard constraint: availability equals available"));
    }

    #[test]
    fn test_threshold_clears_pass_flag() {
        let candidate = create_candidate("2", &["Py"], 5, Availability::Available);
        let result = MatchingEngine::evaluate_candidate(&candidate, &js_constraints(0.3));

        assert!(!result.passed_hard_constraints);
        assert_eq!(result.soft_score, 0.0);
        assert_eq!(result.reasons.last().unwrap(), "Soft constraint threshold not met: 0/0.3");
    }

    #[test]
    fn test_one_reason_per_constraint() {
        let candidate = create_candidate("1", &["JS"], 1, Availability::Available);
        let result = MatchingEngine::evaluate_candidate(&candidate, &js_constraints(0.3));

        assert!(result.passed_hard_constraints);
        assert_eq!(
            result.reasons,
            vec![
                "Passed hard constraint: availability equals available".to_string(),
                "Passed soft constraint: skills (weight: 0.5)".to_string(),
            ]
        );
    }

    #[test]
    fn test_soft_score_sums_passed_weights() {
        let candidate = create_candidate("1", &["JavaScript"], 3, Availability::Available);
        let result = MatchingEngine::evaluate_candidate(&candidate, &MatchingEngine::default_constraint_set());

        assert!(result.passed_hard_constraints);
        assert!((result.soft_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let pool = vec![
            create_candidate("a", &["JS"], 1, Availability::Available),
            create_candidate("b", &["JS"], 9, Availability::Available),
            create_candidate("c", &["JS"], 4, Availability::Available),
        ];

        let ranked = MatchingEngine::rank(&pool, &js_constraints(0.3));
        let ids: Vec<&str> = ranked.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_raising_threshold_never_grows_accepted_set() {
        let pool = vec![
            create_candidate("a", &["JavaScript"], 3, Availability::Available),
            create_candidate("b", &["Go"], 3, Availability::Available),
            create_candidate("c", &["JavaScript"], 0, Availability::Available),
            create_candidate("d", &["Go"], 0, Availability::Available),
        ];
        let mut set = MatchingEngine::default_constraint_set();

        let mut previous = usize::MAX;
        for step in 0..=10 {
            set.soft_threshold = step as f64 / 10.0;
            let accepted = MatchingEngine::rank(&pool, &set).len();
            assert!(accepted <= previous);
            previous = accepted;
        }
    }

    #[tokio::test]
    async fn test_find_best_match_uses_defaults_without_constraint_set() {
        let store = Arc::new(MemoryStore::new());
        store.add_recruiter("rec-1", None);
        store.add_candidate(create_candidate("1", &["JavaScript"], 3, Availability::Available));

        let engine = MatchingEngine::new(store);
        let best = engine.find_best_match("rec-1").await.unwrap().unwrap();
        assert_eq!(best.candidate.id, "1");
    }

    #[tokio::test]
    async fn test_find_best_match_unknown_recruiter() {
        let engine = MatchingEngine::new(Arc::new(MemoryStore::new()));
        let err = engine.find_best_match("ghost").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_best_match_empty_pool_is_none() {
        let store = Arc::new(MemoryStore::new());
        store.add_recruiter("rec-1", Some(js_constraints(0.3)));

        let engine = MatchingEngine::new(store);
        assert!(engine.find_best_match("rec-1").await.unwrap().is_none());
    }
}
