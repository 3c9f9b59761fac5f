//! End-to-end tests: key events through a session into a store, then scoring.

use keystroke_telemetry::{
    analyze,
    collector::{ChannelCollector, CollectorConfig, KeyEvent},
    core::{FeatureStats, RecordBuilder, WindowLabel},
    session::{TelemetrySession, DEFAULT_WINDOW_DURATION},
    store::WindowStore,
    transparency::create_shared_log,
    ScoringError, ScoringPolicy, TelemetryEmitter, WindowAggregate,
};
use std::sync::Arc;
use std::time::Duration;

/// Alternating hold/gap pairs, in milliseconds.
struct Rhythm {
    holds: [f64; 2],
    gaps: [f64; 2],
}

const OWNER: Rhythm = Rhythm {
    holds: [80.0, 100.0],
    gaps: [180.0, 220.0],
};

const STAND_IN: Rhythm = Rhythm {
    holds: [150.0, 170.0],
    gaps: [380.0, 420.0],
};

fn type_strokes(session: &TelemetrySession, rhythm: &Rhythm, strokes: usize, clock: &mut f64) {
    const KEYS: [&str; 4] = ["KeyA", "KeyS", "KeyD", "KeyF"];
    for i in 0..strokes {
        let key = KEYS[i % KEYS.len()];
        session.handle_event(&KeyEvent::down(key, *clock));
        session.handle_event(&KeyEvent::up(key, *clock + rhythm.holds[i % 2]));
        *clock += rhythm.gaps[i % 2];
    }
}

fn aggregate(stroke_count: u32, means: [i64; 5], std_devs: [i64; 5]) -> WindowAggregate {
    WindowAggregate {
        stroke_count,
        ud: FeatureStats::new(means[0], std_devs[0]),
        du1: FeatureStats::new(means[1], std_devs[1]),
        du2: FeatureStats::new(means[2], std_devs[2]),
        dd: FeatureStats::new(means[3], std_devs[3]),
        uu: FeatureStats::new(means[4], std_devs[4]),
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_history_scores_stand_in_as_suspicious() {
    let store = Arc::new(WindowStore::new());
    let log = create_shared_log();
    let emitter = TelemetryEmitter::new("subject-7", store.clone(), RecordBuilder::new(), log.clone());
    let session = TelemetrySession::new(DEFAULT_WINDOW_DURATION, emitter, log.clone()).unwrap();
    session.start().unwrap();
    // Keep typing off the tick boundaries
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut clock = 0.0;
    let plan: [(&Rhythm, usize); 5] = [
        (&OWNER, 30),
        (&OWNER, 40),
        (&OWNER, 36),
        (&STAND_IN, 30),
        (&STAND_IN, 3),
    ];
    for (rhythm, strokes) in plan {
        type_strokes(&session, rhythm, strokes, &mut clock);
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
    session.stop();

    let history = store.history("subject-7");
    assert_eq!(
        history.iter().map(|w| w.stroke_count).collect::<Vec<_>>(),
        vec![30, 40, 36, 30, 3]
    );
    assert_eq!(history[1].ud, FeatureStats::new(90, 10));

    let series = analyze("subject-7", &history, &ScoringPolicy::default()).unwrap();
    assert_eq!(series.profile_index(), 1);
    assert_eq!(
        series.labels().map(|(_, label)| label).collect::<Vec<_>>(),
        vec![
            WindowLabel::Legitimate,
            WindowLabel::Profile,
            WindowLabel::Legitimate,
            WindowLabel::Suspicious,
            WindowLabel::Inactive,
        ]
    );
    assert!(series.points()[0].smd < 0.5);
    assert!(series.points()[3].smd > 1.2);
    assert_eq!(series.points()[4].smd, 0.0);
    assert_eq!(series.active_runs(), vec![0..4]);

    let stats = log.stats();
    assert_eq!(stats.windows_flushed, 5);
    assert_eq!(stats.windows_submitted, 5);
    assert_eq!(stats.samples_derived, 139);
}

#[tokio::test(start_paused = true)]
async fn test_collector_feeds_session() {
    let store = Arc::new(WindowStore::new());
    let log = create_shared_log();
    let emitter = TelemetryEmitter::new("subject-1", store.clone(), RecordBuilder::new(), log.clone());
    let session = TelemetrySession::new(Duration::from_secs(10), emitter, log).unwrap();

    let mut collector = ChannelCollector::new(CollectorConfig::default());
    collector.start().unwrap();
    let sender = collector.sender().unwrap();
    collector.close();

    for line in ["KeyQ down 0", "KeyQ up 70", "KeyW down 200", "KeyW up 260"] {
        sender.send(line.parse::<KeyEvent>().unwrap()).unwrap();
    }
    drop(sender);

    session.start().unwrap();
    while let Some(event) = collector.try_recv() {
        session.handle_event(&event);
    }
    tokio::time::sleep(Duration::from_secs(11)).await;
    session.stop();

    let history = store.history("subject-1");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stroke_count, 2);
    assert_eq!(history[0].ud, FeatureStats::new(65, 5));
    // Only the second keystroke carries inter-key features
    assert_eq!(history[0].dd, FeatureStats::new(200, 0));
    assert_eq!(history[0].du1, FeatureStats::new(130, 0));
    assert_eq!(history[0].uu, FeatureStats::new(190, 0));
    assert_eq!(history[0].du2, FeatureStats::new(260, 0));
}

#[test]
fn test_worked_example_is_legitimate() {
    let profile = aggregate(60, [100, 50, 80, 150, 140], [10, 10, 20, 5, 5]);
    // Distances 1.0, 0.5, 0.0, 2.0, 2.0
    let sample = aggregate(45, [110, 45, 80, 160, 130], [12, 9, 25, 6, 4]);

    let series = analyze(
        "subject-3",
        &[profile, sample],
        &ScoringPolicy::default(),
    )
    .unwrap();

    assert_eq!(series.profile_index(), 0);
    let scored = series.points()[1];
    assert!((scored.smd - 1.1).abs() < 1e-9);
    assert_eq!(series.label(&scored), WindowLabel::Legitimate);

    let strict = ScoringPolicy {
        suspicion_threshold: 1.0,
        ..ScoringPolicy::default()
    };
    let series = analyze("subject-3", &[profile, sample], &strict).unwrap();
    assert_eq!(series.label(&series.points()[1]), WindowLabel::Suspicious);
}

#[test]
fn test_scoring_errors() {
    let one = [WindowAggregate::with_strokes(40)];
    assert_eq!(
        analyze("subject-1", &one, &ScoringPolicy::default()),
        Err(ScoringError::InsufficientHistory {
            available: 1,
            required: 2
        })
    );
    assert_eq!(
        analyze("   ", &[one[0], one[0]], &ScoringPolicy::default()),
        Err(ScoringError::MissingIdentity)
    );
}

#[test]
fn test_persisted_history_round_trips_through_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("windows.json");

    let store = WindowStore::open(&path).unwrap();
    store.append("subject-9", aggregate(25, [90, 100, 290, 200, 200], [10, 20, 20, 20, 25]));
    store.append("subject-9", aggregate(8, [95, 110, 300, 210, 205], [15, 20, 30, 25, 25]));
    store.append("subject-9", aggregate(25, [90, 100, 290, 200, 200], [10, 20, 20, 20, 25]));
    store.save().unwrap();

    let reopened = WindowStore::open(&path).unwrap();
    let series = analyze(
        "subject-9",
        &reopened.history("subject-9"),
        &ScoringPolicy::default(),
    )
    .unwrap();

    assert_eq!(series.profile_index(), 0);
    assert_eq!(
        series.labels().map(|(_, label)| label).collect::<Vec<_>>(),
        vec![WindowLabel::Profile, WindowLabel::Inactive, WindowLabel::Legitimate]
    );
    assert_eq!(series.points()[2].smd, 0.0);
    assert_eq!(series.active_runs(), vec![0..1, 2..3]);
}
