// Unit tests for the screening core matching path

use screening_core::core::{evaluate, resolve_field, MatchingEngine};
use screening_core::models::{
    Availability, CandidateRecord, Constraint, ConstraintSet, Predicate, SoftConstraint,
};
use screening_core::services::MemoryStore;
use serde_json::json;
use std::sync::Arc;

fn create_candidate(id: &str, skills: &[&str], experience: u32) -> CandidateRecord {
    CandidateRecord {
        id: id.to_string(),
        display_name: Some(format!("Candidate {}", id)),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        experience,
        location: "Remote - EU".to_string(),
        availability: Availability::Available,
        is_online: true,
        attributes: Default::default(),
    }
}

fn scenario_a_constraints() -> ConstraintSet {
    ConstraintSet {
        hard_constraints: vec![Constraint::new("availability", Predicate::Equals(json!("available")))],
        soft_constraints: vec![SoftConstraint::new("skills", Predicate::Contains(json!("JS")), 0.5)],
        soft_threshold: 0.3,
    }
}

#[test]
fn test_contains_is_case_insensitive_for_text() {
    let candidate = create_candidate("1", &["Rust"], 3);
    assert!(evaluate(&candidate, &Constraint::new("location", Predicate::Contains(json!("remote")))));
    assert!(!evaluate(&candidate, &Constraint::new("location", Predicate::Contains(json!("onsite")))));
}

#[test]
fn test_list_contains_is_membership() {
    let candidate = create_candidate("1", &["Rust", "Go"], 3);
    assert!(evaluate(&candidate, &Constraint::new("skills", Predicate::Contains(json!("Go")))));
    assert!(!evaluate(&candidate, &Constraint::new("skills", Predicate::Contains(json!("Java")))));
}

#[test]
fn test_missing_field_fails_every_operator() {
    let candidate = create_candidate("1", &["Rust"], 3);
    let predicates = vec![
        Predicate::Equals(json!("x")),
        Predicate::Contains(json!("x")),
        Predicate::GreaterThan(json!(0)),
        Predicate::LessThan(json!(100)),
        Predicate::In(vec![json!("x")]),
        Predicate::NotIn(vec![json!("x")]),
    ];

    for predicate in predicates {
        assert!(!evaluate(&candidate, &Constraint::new("attributes.timezone", predicate)));
    }
}

#[test]
fn test_nested_attribute_path() {
    let mut candidate = create_candidate("1", &["Rust"], 3);
    candidate
        .attributes
        .insert("profile".to_string(), json!({ "languages": ["en", "pt"] }));

    let document = screening_core::core::constraints::candidate_document(&candidate);
    assert_eq!(resolve_field(&document, "attributes.profile.languages.1"), Some(&json!("pt")));
    assert!(evaluate(
        &candidate,
        &Constraint::new("attributes.profile.languages", Predicate::Contains(json!("en")))
    ));
}

#[test]
fn test_numeric_comparisons() {
    let candidate = create_candidate("1", &["Rust"], 3);
    assert!(evaluate(&candidate, &Constraint::new("experience", Predicate::GreaterThan(json!(2)))));
    assert!(!evaluate(&candidate, &Constraint::new("experience", Predicate::GreaterThan(json!(3)))));
    assert!(evaluate(&candidate, &Constraint::new("experience", Predicate::LessThan(json!("4")))));
}

#[test]
fn test_in_and_not_in() {
    let candidate = create_candidate("1", &["Rust"], 3);
    let allowed = vec![json!("available"), json!("busy")];
    assert!(evaluate(&candidate, &Constraint::new("availability", Predicate::In(allowed.clone()))));
    assert!(!evaluate(&candidate, &Constraint::new("availability", Predicate::NotIn(allowed))));
}

#[test]
fn test_constraint_set_from_json() {
    let set: ConstraintSet = serde_json::from_value(json!({
        "hardConstraints": [{ "field": "availability", "operator": "equals", "value": "available" }],
        "softConstraints": [{ "field": "skills", "operator": "contains", "value": "Rust", "weight": 0.4 }],
        "softConstraintThreshold": 0.2
    }))
    .unwrap();

    assert_eq!(set.soft_constraints[0].weight, 0.4);
    assert!(set.validate().is_ok());
}

#[test]
fn test_scenario_a_evaluation() {
    let constraints = scenario_a_constraints();
    let js = MatchingEngine::evaluate_candidate(&create_candidate("1", &["JS"], 1), &constraints);
    let py = MatchingEngine::evaluate_candidate(&create_candidate("2", &["Py"], 5), &constraints);

    assert!(js.passed_hard_constraints);
    assert_eq!(js.soft_score, 0.5);
    assert!(!py.passed_hard_constraints);
    assert_eq!(py.soft_score, 0.0);
    assert!(py
        .reasons
        .iter()
        .any(|r| r.starts_with("Soft constraint threshold not met")));
}

#[tokio::test]
async fn test_scenario_a_find_best_match() {
    let store = Arc::new(MemoryStore::new());
    store.add_candidate(create_candidate("1", &["JS"], 1));
    store.add_candidate(create_candidate("2", &["Py"], 5));
    store.add_recruiter("rec-1", Some(scenario_a_constraints()));

    let engine = MatchingEngine::new(store);
    let best = engine.find_best_match("rec-1").await.unwrap().unwrap();

    assert_eq!(best.candidate.id, "1");
    assert_eq!(best.soft_score, 0.5);
}

#[tokio::test]
async fn test_no_eligible_candidates_returns_none() {
    let store = Arc::new(MemoryStore::new());
    let mut offline = create_candidate("1", &["JS"], 4);
    offline.is_online = false;
    store.add_candidate(offline);
    store.add_recruiter("rec-1", None);

    let engine = MatchingEngine::new(store);
    assert!(engine.find_best_match("rec-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_default_constraints_used_without_recruiter_set() {
    let store = Arc::new(MemoryStore::new());
    store.add_candidate(create_candidate("py", &["Python"], 1));
    store.add_candidate(create_candidate("js", &["JavaScript"], 4));
    store.add_recruiter("rec-1", None);

    let engine = MatchingEngine::new(store);
    let best = engine.find_best_match("rec-1").await.unwrap().unwrap();

    assert_eq!(best.candidate.id, "js");
    assert!((best.soft_score - 0.6).abs() < 1e-9);
}
