//! Rules and decision pipeline on a fixed feature vector.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use risk_agent::config::RulesConfig;
use risk_agent::decision::{DecisionContext, DecisionPipeline, DecisionPolicy, Thresholds};
use risk_agent::events::EventKind;
use risk_agent::features::FeatureVector;
use risk_agent::rules::{RuleEngine, RuleFlag};

fn features() -> FeatureVector {
    FeatureVector {
        event_id: "bench".into(),
        subject_id: "user".into(),
        ts: Utc::now(),
        kind: EventKind::Transaction,
        failed_login_10min: 1,
        new_device: false,
        new_ip: true,
        new_counterparty: true,
        amount_deviation: 40.0,
        amount_zscore: 1.2,
        distance_from_last_location_km: 3.0,
        time_since_last_login_s: 120.0,
        time_since_last_reset_s: 0.0,
        time_since_last_txn_s: 3600.0,
        login_reset_gap_s: None,
        login_velocity_10min: 1,
        txn_velocity_10min: 2,
        ip_change_velocity_10min: 1,
        device_change_velocity_10min: 0,
    }
}

fn bench_rules(c: &mut Criterion) {
    let rules = RuleEngine::new(RulesConfig::default());
    let f = features();
    c.bench_function("rules_evaluate", |b| b.iter(|| black_box(rules.evaluate(black_box(&f)))));
}

fn bench_decide(c: &mut Criterion) {
    let pipeline =
        DecisionPipeline::new(DecisionPolicy::default(), Thresholds::new(0.2, 0.5, 0.8).ok()).unwrap();
    let flags = [RuleFlag::NewIp, RuleFlag::FailedLoginVelocity];
    c.bench_function("decision_decide", |b| {
        b.iter(|| {
            black_box(
                pipeline
                    .decide(black_box(0.42), black_box(0.40), &flags, DecisionContext::new())
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_rules, bench_decide);
criterion_main!(benches);
