//! Integration test: config load, event stream through the engine, dispatcher, audit store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use risk_agent::{
    config::AppConfig,
    decision::{reason, Action},
    dispatch::{Dispatcher, Outcome},
    error::{ConfigError, DependencyError, InputError, RiskError},
    events::{parse_event_line, Event, EventKind, EventReader},
    features::{haversine_km, FeatureVector},
    risk::RiskEngine,
    rules::RuleFlag,
    sink::{AuditStore, DecisionSink, JsonLinesSink},
    Thresholds,
};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

const PARIS: (f64, f64) = (48.8566, 2.3522);
const NEW_YORK: (f64, f64) = (40.7128, -74.0060);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn engine(model_score: f64) -> RiskEngine {
    let scorer = move |_: &FeatureVector| -> Result<f64, DependencyError> { Ok(model_score) };
    RiskEngine::new(&AppConfig::default(), Arc::new(scorer)).unwrap()
}

fn login(subject: &str, at: DateTime<Utc>, device: &str, place: (f64, f64)) -> Event {
    Event::new(EventKind::Login, at, subject, device, "10.0.0.1", place)
}

#[test]
fn config_load_default_and_invalid() {
    let c = AppConfig::load(Path::new("nonexistent-config.json")).unwrap();
    assert_eq!(c.features.window_secs, 600);
    assert_eq!(c.decision.thresholds, Thresholds::new(0.2, 0.5, 0.8).ok());
    assert!(!c.audit.enabled);

    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(
        f,
        r#"{{"decision": {{"thresholds": {{"low": 0.5, "medium": 0.3, "high": 0.8}}}}}}"#
    )
    .unwrap();
    assert!(matches!(
        AppConfig::load(f.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn misordered_thresholds_prevent_any_decision() {
    assert_eq!(
        Thresholds::new(0.5, 0.3, 0.8),
        Err(ConfigError::ThresholdOrder {
            low: 0.5,
            medium: 0.3,
            high: 0.8
        })
    );
    let mut config = AppConfig::default();
    config.decision.thresholds = None;
    let scorer = |_: &FeatureVector| -> Result<f64, DependencyError> { Ok(0.0) };
    assert!(matches!(
        RiskEngine::new(&config, Arc::new(scorer)),
        Err(ConfigError::MissingThresholds)
    ));
}

#[test]
fn failed_login_burst_then_window_eviction() {
    let e = engine(0.1);
    let mut counts = Vec::new();
    for (i, secs) in [0, 20, 40].iter().enumerate() {
        let ev = Event::new(
            EventKind::LoginFail,
            t0() + Duration::seconds(*secs),
            "alice",
            "d1",
            "10.0.0.1",
            PARIS,
        )
        .with_id(format!("f{i}"));
        counts.push(e.extract(&ev).unwrap().failed_login_10min);
    }
    assert_eq!(counts, vec![1, 2, 3]);

    let late = Event::new(
        EventKind::LoginFail,
        t0() + Duration::seconds(40) + Duration::minutes(11),
        "alice",
        "d1",
        "10.0.0.1",
        PARIS,
    );
    assert_eq!(e.extract(&late).unwrap().failed_login_10min, 1);
}

#[test]
fn first_event_and_travel_block() {
    let e = engine(0.01);
    let first = Event::new(EventKind::Login, t0(), "bob", "d1", "1.1.1.1", PARIS)
        .with_transaction(25.0, "shop");
    let f = e.extract(&first).unwrap();
    assert!(f.new_device && f.new_ip && f.new_counterparty);
    assert_eq!(f.amount_deviation, 0.0);
    assert_eq!(f.distance_from_last_location_km, 0.0);

    let d = e.assess(&login("bob", t0() + Duration::hours(1), "d1", NEW_YORK)).unwrap();
    assert_eq!(d.action, Action::Block);
    assert_eq!(d.reasons[0], reason::FORCED_BY_RULE_FLAG);
    assert!(d.rule_flags.contains(&RuleFlag::ImpossibleTravel));
    assert!(d.final_score < 0.5);
}

#[test]
fn amount_spike_is_blocked_after_a_baseline() {
    let e = engine(0.05);
    let amounts = [100.0, 110.0, 90.0, 105.0, 95.0];
    for (i, a) in amounts.iter().enumerate() {
        let ev = login("carol", t0() + Duration::hours(i as i64), "d1", PARIS)
            .with_transaction(*a, "landlord");
        let d = e.assess(&ev).unwrap();
        if i > 0 {
            assert_eq!(d.action, Action::Allow, "baseline txn {i}: {:?}", d.reasons);
        }
    }
    let spike = login("carol", t0() + Duration::hours(6), "d1", PARIS).with_transaction(10_000.0, "landlord");
    let d = e.assess(&spike).unwrap();
    assert_eq!(d.action, Action::Block);
    assert_eq!(
        d.reasons,
        vec!["forced_by_rule_flag", "rule:high_amount_deviation"]
    );
}

#[test]
fn spike_over_constant_baseline_is_blocked() {
    let e = engine(0.05);
    for i in 0..5 {
        let rent = login("ivan", t0() + Duration::days(i), "d1", PARIS).with_transaction(100.0, "landlord");
        e.assess(&rent).unwrap();
    }
    let spike = login("ivan", t0() + Duration::days(6), "d1", PARIS).with_transaction(1_000_000.0, "landlord");
    let d = e.assess(&spike).unwrap();
    assert_eq!(d.action, Action::Block);
    assert_eq!(d.rule_flags, vec![RuleFlag::HighAmountDeviation]);
}

#[test]
fn score_band_boundaries_are_inclusive() {
    // no flags for a known device; final = (model + 0) / 2
    let e = engine(1.0);
    e.extract(&login("dave", t0(), "d1", PARIS)).unwrap();
    let d = e.assess(&login("dave", t0() + Duration::hours(1), "d1", PARIS)).unwrap();
    assert_eq!(d.final_score, 0.5);
    assert_eq!(d.action, Action::Otp);
    assert_eq!(d.reasons, vec![reason::SCORE_MEDIUM]);
}

#[test]
fn input_errors_reject_without_deciding() {
    let e = engine(0.1);
    let bad_amount = login("erin", t0(), "d1", PARIS).with_transaction(-5.0, "x");
    assert!(matches!(
        e.assess(&bad_amount),
        Err(RiskError::Input(InputError::NonPositiveAmount { .. }))
    ));
    // rejected events leave no state behind
    assert!(e.store().snapshot("erin").is_none());

    e.assess(&login("erin", t0() + Duration::hours(2), "d1", PARIS)).unwrap();
    assert!(matches!(
        e.assess(&login("erin", t0(), "d1", PARIS)),
        Err(RiskError::Input(InputError::OutOfOrder { .. }))
    ));
}

#[test]
fn reader_parses_dataset_column_names() {
    let data = concat!(
        r#"{"user_id":"u1","timestamp":"2024-03-01T09:00:00Z","device_id":"d","ip":"1.2.3.4","event_type":"login","lat":1.0,"lon":2.0}"#,
        "\n\n",
        r#"{"user_id":"u1","timestamp":"2024-03-01T09:01:00Z","device_id":"d","ip":"1.2.3.4","event_type":"transaction","amount":12.5,"receiver_id":"r9","lat":1.0,"lon":2.0}"#,
        "\n",
        "not json\n",
    );
    let items: Vec<_> = EventReader::new(Cursor::new(data)).collect();
    assert_eq!(items.len(), 3);
    let txn = items[1].as_ref().unwrap();
    assert_eq!(txn.kind, EventKind::Transaction);
    assert_eq!(txn.counterparty_id.as_deref(), Some("r9"));
    assert!(!txn.event_id.is_empty());
    assert!(matches!(items[2], Err(InputError::Malformed { line: 4, .. })));
    assert!(parse_event_line("{}", 1).is_err());
}

#[test]
fn haversine_symmetry() {
    let ab = haversine_km(PARIS.0, PARIS.1, NEW_YORK.0, NEW_YORK.1);
    let ba = haversine_km(NEW_YORK.0, NEW_YORK.1, PARIS.0, PARIS.1);
    assert!((ab - ba).abs() < 1e-9);
    assert!((ab - 5837.0).abs() < 15.0);
    assert_eq!(haversine_km(PARIS.0, PARIS.1, PARIS.0, PARIS.1), 0.0);
}

#[test]
fn decisions_flow_to_sinks() {
    let e = engine(0.2);
    let d = e.assess(&login("frank", t0(), "d1", PARIS).with_id("ev-1")).unwrap();

    let json = JsonLinesSink::new(Vec::new());
    json.record(&d).unwrap();
    let line = String::from_utf8(json.into_inner()).unwrap();
    assert!(line.contains(r#""action":"OTP""#));
    assert!(line.contains(r#""event_id":"ev-1""#));

    let audit = AuditStore::in_memory(b"integration").unwrap();
    audit.record(&d).unwrap();
    let ids = audit.ids_for_subject("frank").unwrap();
    assert_eq!(ids.len(), 1);
    let stored = audit.get(&ids[0]).unwrap().unwrap();
    assert_eq!(stored.decision, d);
}

async fn drain(mut rx: mpsc::Receiver<Outcome>) -> Vec<Outcome> {
    let mut out = Vec::new();
    while let Some(o) = rx.recv().await {
        out.push(o);
    }
    out
}

#[tokio::test]
async fn dispatcher_keeps_per_subject_order() {
    let engine = Arc::new(engine(0.1));
    let mut config = AppConfig::default().dispatch;
    config.workers = 3;
    let (tx, rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::spawn(Arc::clone(&engine), &config, tx);

    for i in 0..10 {
        for subject in ["s1", "s2", "s3", "s4"] {
            let ev = Event::new(
                EventKind::LoginFail,
                t0() + Duration::seconds(i * 5),
                subject,
                "d1",
                "10.0.0.1",
                PARIS,
            )
            .with_id(format!("{subject}-{i}"));
            dispatcher.submit(ev).await.unwrap();
        }
    }
    dispatcher.shutdown().await;
    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 40);

    for subject in ["s1", "s2", "s3", "s4"] {
        let ids: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.subject_id == subject)
            .map(|o| o.event_id.as_str())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("{subject}-{i}")).collect();
        assert_eq!(ids, expected);
        assert!(outcomes
            .iter()
            .filter(|o| o.subject_id == subject)
            .all(|o| o.result.is_ok()));
    }
    let state = engine.store().snapshot("s1").unwrap();
    assert_eq!(state.windows.login_fail.len(), 10);
}

#[tokio::test]
async fn slow_model_times_out_without_a_decision() {
    let slow = |_: &FeatureVector| -> Result<f64, DependencyError> {
        std::thread::sleep(std::time::Duration::from_millis(300));
        Ok(0.0)
    };
    let engine = Arc::new(RiskEngine::new(&AppConfig::default(), Arc::new(slow)).unwrap());
    let mut config = AppConfig::default().dispatch;
    config.workers = 1;
    config.model_timeout_ms = 20;
    let (tx, rx) = mpsc::channel(4);
    let dispatcher = Dispatcher::spawn(engine, &config, tx);
    dispatcher.submit(login("gina", t0(), "d1", PARIS)).await.unwrap();
    dispatcher.shutdown().await;

    let outcomes = drain(rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].result,
        Err(RiskError::Dependency(DependencyError::Timeout(20)))
    );
}

#[tokio::test]
async fn model_failure_is_surfaced() {
    let down = |_: &FeatureVector| -> Result<f64, DependencyError> {
        Err(DependencyError::ModelUnavailable("offline".into()))
    };
    let engine = Arc::new(RiskEngine::new(&AppConfig::default(), Arc::new(down)).unwrap());
    let (tx, rx) = mpsc::channel(4);
    let dispatcher = Dispatcher::spawn(engine, &AppConfig::default().dispatch, tx);
    dispatcher.submit(login("hank", t0(), "d1", PARIS)).await.unwrap();
    dispatcher.shutdown().await;
    let outcomes = drain(rx).await;
    assert!(matches!(
        outcomes[0].result,
        Err(RiskError::Dependency(DependencyError::ModelUnavailable(_)))
    ));
}
