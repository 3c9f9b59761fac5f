//! Demonstration of keystroke capture and impostor scoring.
//!
//! This demo shows how to:
//! 1. Feed key events through a window aggregator
//! 2. Package flushed windows as telemetry records
//! 3. Store them per subject
//! 4. Score the history against the subject's profile
//!
//! Run with: cargo run --example capture_demo
//!
//! Typing is synthetic: one typist fills the first windows, a slower one
//! takes over halfway, and the last window is nearly idle.

use keystroke_telemetry::{
    collector::KeyEvent,
    core::{analyze, RecordBuilder, ScoringPolicy, WindowAggregator},
    store::WindowStore,
    transport::WindowSink,
    PRIVACY_DECLARATION,
};

/// Timing habits of a simulated typist, in milliseconds.
struct Typist {
    hold: f64,
    gap: f64,
    jitter: f64,
}

/// Small deterministic jitter source so the demo output is stable.
struct Lcg(u64);

impl Lcg {
    fn next_unit(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as f64 / (1u64 << 31) as f64) * 2.0 - 1.0
    }
}

fn type_window(
    aggregator: &mut WindowAggregator,
    typist: &Typist,
    strokes: usize,
    clock: &mut f64,
    rng: &mut Lcg,
) {
    const KEYS: [&str; 6] = ["KeyT", "KeyH", "KeyE", "Space", "KeyR", "KeyO"];
    for i in 0..strokes {
        let key = KEYS[i % KEYS.len()];
        let hold = typist.hold + typist.jitter * rng.next_unit();
        aggregator.record(&KeyEvent::down(key, *clock));
        aggregator.record(&KeyEvent::up(key, *clock + hold));
        *clock += typist.gap + typist.jitter * rng.next_unit();
    }
}

fn main() -> anyhow::Result<()> {
    println!("Keystroke Telemetry - Capture Demo");
    println!("==================================");
    println!("{PRIVACY_DECLARATION}");

    let subject = "demo-subject";
    let owner = Typist {
        hold: 95.0,
        gap: 210.0,
        jitter: 15.0,
    };
    let stand_in = Typist {
        hold: 150.0,
        gap: 340.0,
        jitter: 30.0,
    };

    let store = WindowStore::new();
    let builder = RecordBuilder::new();
    let mut aggregator = WindowAggregator::new();
    let mut clock = 0.0;
    let mut rng = Lcg(7);

    let plan: [(&Typist, usize); 8] = [
        (&owner, 60),
        (&owner, 80),
        (&owner, 75),
        (&owner, 70),
        (&stand_in, 55),
        (&stand_in, 50),
        (&stand_in, 48),
        (&stand_in, 4),
    ];

    let runtime = tokio::runtime::Runtime::new()?;
    for (typist, strokes) in plan {
        type_window(&mut aggregator, typist, strokes, &mut clock, &mut rng);
        let window = aggregator.flush();
        let record = builder.build(subject, &window);
        println!(
            "Window {}: {} strokes, ud {}±{} ms, dd {}±{} ms",
            record.window_index,
            record.stroke_amount,
            record.ud_mean,
            record.ud_std_dev,
            record.dd_mean,
            record.dd_std_dev
        );
        runtime.block_on(store.submit_window(&record))?;
    }

    let series = analyze(subject, &store.history(subject), &ScoringPolicy::default())?;

    println!();
    println!("Profile window: {}", series.profile_index());
    for (point, label) in series.labels() {
        println!(
            "  window {:>2}  smd {:>6.3}  {}",
            point.window_index, point.smd, label
        );
    }

    Ok(())
}
