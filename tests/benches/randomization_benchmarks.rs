//! # Blind-Trial Randomization Benchmarks
//!
//! Per-assignment cost of each strategy on a study that already holds a
//! realistic number of participants, plus view projection.
//!
//! | Operation | Scaling |
//! |-----------|---------|
//! | Simple / adaptive | O(arms) |
//! | Block | O(block size) at slot zero, O(1) otherwise |
//! | Stratified | O(arms) given stored counts |
//! | Minimization | O(participants × factors) |
//! | Projection | O(participants + audit entries) |

use blinding_engine::algorithms::{
    adaptive_assign, block_assign, minimization_assign, simple_assign, stratified_assign,
};
use blinding_engine::{
    project, AccessLevel, Arm, BlindedParticipant, BlindingLevel, ParticipantAttributes,
    RandomizationConfig, RoleName, StratumCounts, Study, StudyRole, StudyStatus,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

const SITES: [&str; 4] = ["north", "south", "east", "west"];

fn study_with(randomization: RandomizationConfig, participants: usize) -> Study {
    let arms = vec![
        Arm::new("A", "Low dose", "LD", participants),
        Arm::new("B", "High dose", "HD", participants),
        Arm::new("C", "Placebo", "PL", participants).placebo(),
    ];
    let mut rng = StdRng::seed_from_u64(1);
    let participants = (0..participants)
        .map(|i| BlindedParticipant {
            participant_id: format!("P{}", i),
            blinded_id: format!("BP-{}", i),
            arm_id: arms[rng.gen_range(0..arms.len())].id.clone(),
            enrolled_at: i as u64,
            withdrawn_at: None,
            withdrawal_reason: None,
            data_partitions: vec![SITES[i % SITES.len()].to_string()],
        })
        .collect();

    Study {
        id: "bench".to_string(),
        title: "Benchmark study".to_string(),
        blinding_level: BlindingLevel::Double,
        status: StudyStatus::Active,
        randomization,
        arms,
        participants,
        roles: vec![StudyRole::new(
            "pi",
            RoleName::PrincipalInvestigator,
            AccessLevel::FullAccess,
        )],
        unblinding_requests: vec![],
        breaches: vec![],
        audit_log: vec![],
        version: 1,
        created_by: "pi".to_string(),
        created_at: 0,
        updated_at: 0,
    }
}

fn attributes(i: usize) -> ParticipantAttributes {
    [
        ("site".to_string(), SITES[i % SITES.len()].to_string()),
        ("sex".to_string(), if i % 2 == 0 { "F" } else { "M" }.to_string()),
    ]
    .into_iter()
    .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("randomization");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    let mut rng = StdRng::seed_from_u64(42);

    let simple = study_with(RandomizationConfig::simple().with_ratio(&[2, 1, 1]), 1_000);
    group.bench_function("simple", |b| {
        b.iter(|| black_box(simple_assign(&simple, &mut rng)))
    });

    let adaptive = study_with(RandomizationConfig::adaptive(), 1_000);
    group.bench_function("adaptive", |b| {
        b.iter(|| black_box(adaptive_assign(&adaptive, &mut rng)))
    });

    // 1_002 participants: the next slot starts a fresh block
    let block = study_with(RandomizationConfig::block(Some(6)), 1_002);
    group.bench_function("block_new_block", |b| {
        b.iter(|| black_box(block_assign(&block, None, 0, &mut rng)))
    });

    let stratified = study_with(RandomizationConfig::stratified(&["site", "sex"]), 1_000);
    let stored = StratumCounts {
        study_id: "bench".to_string(),
        stratum_id: "north|F".to_string(),
        counts: [("A".to_string(), 40), ("B".to_string(), 41), ("C".to_string(), 40)]
            .into_iter()
            .collect(),
    };
    let north_f = attributes(0);
    group.bench_function("stratified", |b| {
        b.iter(|| black_box(stratified_assign(&stratified, &north_f, Some(&stored), &mut rng)))
    });

    group.finish();
}

fn bench_minimization_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("minimization");
    group.measurement_time(Duration::from_secs(5));

    let mut rng = StdRng::seed_from_u64(7);
    for size in [100, 1_000, 5_000] {
        let study = study_with(
            RandomizationConfig::minimization(&[("site", 1.0), ("sex", 2.0)]),
            size,
        );
        let population: HashMap<_, _> = (0..size)
            .map(|i| (format!("P{}", i), attributes(i)))
            .collect();
        let newcomer = attributes(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("assign", size), &size, |b, _| {
            b.iter(|| black_box(minimization_assign(&study, &newcomer, &population, &mut rng)))
        });
    }

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");

    let study = study_with(RandomizationConfig::simple(), 5_000);
    for (name, role) in [
        (
            "blinded",
            StudyRole::new("res", RoleName::Researcher, AccessLevel::BlindedAccess)
                .with_partitions(&["north"]),
        ),
        (
            "aggregated",
            StudyRole::new("an", RoleName::Analyst, AccessLevel::AggregatedOnly),
        ),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(project(&study, &role, "BLINDED")))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_strategies,
    bench_minimization_scaling,
    bench_projection
);
criterion_main!(benches);
