// Criterion benchmarks for the screening core matching engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use screening_core::core::{evaluate, MatchingEngine};
use screening_core::models::{Availability, CandidateRecord, Constraint, Predicate};
use serde_json::json;

const SKILLS: [&str; 5] = ["JavaScript", "Rust", "Python", "Go", "TypeScript"];

fn create_candidate(id: usize) -> CandidateRecord {
    let mut attributes = serde_json::Map::new();
    attributes.insert("languages".to_string(), json!(["English", "Portuguese"]));

    CandidateRecord {
        id: id.to_string(),
        display_name: Some(format!("Candidate {}", id)),
        skills: vec![SKILLS[id % 5].to_string(), SKILLS[(id + 2) % 5].to_string()],
        experience: (id % 12) as u32,
        location: if id % 3 == 0 { "Remote" } else { "Berlin" }.to_string(),
        availability: Availability::Available,
        is_online: true,
        attributes,
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let candidate = create_candidate(7);
    let nested = Constraint::new("attributes.languages", Predicate::Contains(json!("English")));
    let numeric = Constraint::new("experience", Predicate::GreaterThan(json!(3)));

    c.bench_function("evaluate_nested_contains", |b| {
        b.iter(|| evaluate(black_box(&candidate), black_box(&nested)));
    });
    c.bench_function("evaluate_greater_than", |b| {
        b.iter(|| evaluate(black_box(&candidate), black_box(&numeric)));
    });
}

fn bench_rank(c: &mut Criterion) {
    let constraints = MatchingEngine::default_constraint_set();

    let mut group = c.benchmark_group("matching");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let pool: Vec<CandidateRecord> = (0..*candidate_count).map(create_candidate).collect();

        group.bench_with_input(BenchmarkId::new("rank", candidate_count), candidate_count, |b, _| {
            b.iter(|| MatchingEngine::rank(black_box(&pool), black_box(&constraints)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_rank);

criterion_main!(benches);
