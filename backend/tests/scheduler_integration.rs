
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use mock_repo::InMemoryRepository;
use scripted_source::{Reply, ScriptedSource};
use trend_backend::{
    aggregate::TrendRecord,
    config::SchedulerConfig,
    metrics::counters::Counters,
    quote::{Instrument, MarketState},
    scheduler::{CycleScheduler, Phase},
    snapshot::SnapshotRow,
    trend::TrendSignal,
};

const OPEN: MarketState = MarketState::Open;
const CLOSED: MarketState = MarketState::Closed;

// -----------------------
// helpers
// -----------------------

fn instruments() -> Vec<Instrument> {
    vec![
        Instrument::new("ACCOR", "FR0000120404"),
        Instrument::new("AIR LIQUIDE", "FR0000120073"),
        Instrument::new("ALSTOM", "FR0010220475"),
    ]
}

fn cfg() -> SchedulerConfig {
    SchedulerConfig {
        cycle_period: Duration::from_secs(60),
        idle_period: Duration::from_secs(600),
        window_width: 720,
        concurrency: 10,
        tail_len: 5,
        force_open: false,
    }
}

async fn setup(
    source: ScriptedSource,
    cfg: SchedulerConfig,
) -> (
    Arc<ScriptedSource>,
    Arc<InMemoryRepository>,
    Counters,
    CycleScheduler,
) {
    let source = Arc::new(source);
    let repo = Arc::new(InMemoryRepository::default());
    let counters = Counters::default();

    let sched = CycleScheduler::bootstrap(
        source.clone(),
        repo.clone(),
        instruments(),
        cfg,
        counters.clone(),
    )
    .await
    .expect("bootstrap");

    (source, repo, counters, sched)
}

// -----------------------
// INTEGRATION TESTS
// -----------------------

#[tokio::test(start_paused = true)]
async fn probe_then_active_cycle_persists_snapshot_and_series() {
    let (_source, repo, counters, mut sched) =
        setup(ScriptedSource::new(Reply::Price(50.0, OPEN)), cfg()).await;

    assert_eq!(sched.phase(), Phase::Probe);

    let probe = sched.step().await;
    assert_eq!(probe.next, Phase::Active);
    assert_eq!(probe.sleep, Duration::ZERO);

    let step = sched.step().await;
    let report = step.report.expect("active step reports a cycle");

    assert_eq!(step.next, Phase::Active);
    assert!(report.persisted);
    assert_eq!(report.absent, 0);

    let snap = repo.snapshot.lock().await.clone().expect("snapshot written");
    assert_eq!(snap.rows.len(), 3);
    for row in &snap.rows {
        assert_eq!(row.prices, vec![Some(50.0)]);
        // A single sample is a unique maximum inside the tail.
        assert_eq!(row.trend, TrendSignal::HigherHigh);
    }
    assert_eq!(snap.total.trend, 3);
    assert_eq!(report.total, 3);

    let series = repo.series.lock().await.clone();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].aggregated_trend, 3);
    assert_eq!(counters.cycles_completed.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_leave_one_absent_cell_and_cycle_proceeds() {
    let source = ScriptedSource::new(Reply::Price(20.0, OPEN));
    // Probe hits the first instrument; the second fails every attempt.
    source.script(
        "FR0000120073",
        &[Reply::Transient, Reply::Transient, Reply::Transient],
    );

    let (source, repo, counters, mut sched) = setup(source, cfg()).await;

    sched.step().await;
    let report = sched.step().await.report.unwrap();

    assert_eq!(source.attempts_for("FR0000120073"), 3);
    assert_eq!(report.absent, 1);
    assert!(report.persisted);

    let snap = repo.snapshot.lock().await.clone().unwrap();
    assert_eq!(snap.rows[0].prices, vec![Some(20.0)]);
    assert_eq!(snap.rows[1].prices, vec![None]);
    assert_eq!(snap.rows[1].trend, TrendSignal::Flat);
    assert_eq!(snap.rows[2].prices, vec![Some(20.0)]);

    assert_eq!(counters.fetch_transient.load(Ordering::Relaxed), 1);

    // Only that cycle is affected; the next one fills the cell again.
    sched.step().await;
    let snap = repo.snapshot.lock().await.clone().unwrap();
    assert_eq!(snap.rows[1].prices, vec![Some(20.0), None]);
}

#[tokio::test(start_paused = true)]
async fn parse_and_not_found_are_not_retried() {
    let source = ScriptedSource::new(Reply::Price(10.0, OPEN));
    source.script("FR0000120073", &[Reply::Malformed]);
    source.script("FR0010220475", &[Reply::NotFound]);

    let (source, _repo, counters, mut sched) = setup(source, cfg()).await;

    sched.step().await;
    let report = sched.step().await.report.unwrap();

    assert_eq!(report.absent, 2);
    assert_eq!(source.attempts_for("FR0000120073"), 1);
    assert_eq!(source.attempts_for("FR0010220475"), 1);
    assert_eq!(counters.fetch_parse.load(Ordering::Relaxed), 1);
    assert_eq!(counters.fetch_not_found.load(Ordering::Relaxed), 1);
}

/// The last completed fetch decides the market state for the whole index,
/// even when every other instrument still reports continuous trading.
#[tokio::test(start_paused = true)]
async fn single_closed_reading_flips_index_after_cycle_completes() {
    let source = ScriptedSource::new(Reply::Price(30.0, OPEN));
    // Probe + cycle reply for the sentinel, then the last instrument closes.
    source.script("FR0010220475", &[Reply::Price(31.0, CLOSED)]);

    let cfg = SchedulerConfig {
        concurrency: 1, // completion order == instrument order
        ..cfg()
    };
    let (_source, repo, _counters, mut sched) = setup(source, cfg).await;

    sched.step().await;
    let step = sched.step().await;
    let report = step.report.unwrap();

    // The cycle that observed the close still completes and persists.
    assert!(report.persisted);
    assert_eq!(report.market, CLOSED);
    assert_eq!(step.next, Phase::Idle);
    assert_eq!(repo.snapshot_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_neither_ages_windows_nor_persists() {
    let source = ScriptedSource::new(Reply::Price(30.0, CLOSED));
    let (source, repo, counters, mut sched) = setup(source, cfg()).await;

    let probe = sched.step().await;
    assert_eq!(probe.next, Phase::Idle);

    let idle = sched.step().await;
    assert_eq!(idle.next, Phase::Probe);
    assert_eq!(idle.sleep, Duration::from_secs(600));
    assert!(idle.report.is_none());

    for row in sched.table().rows() {
        assert!(row.window.is_empty());
    }
    assert_eq!(repo.snapshot_writes.load(Ordering::SeqCst), 0);
    assert!(repo.series.lock().await.is_empty());
    assert_eq!(counters.idle_probes.load(Ordering::Relaxed), 1);

    // Market reopens: detected at the next probe.
    source.set_fallback(Reply::Price(30.5, OPEN));
    let probe = sched.step().await;
    assert_eq!(probe.next, Phase::Active);
    assert_eq!(sched.market(), OPEN);
}

#[tokio::test(start_paused = true)]
async fn force_open_polls_a_closed_market() {
    let source = ScriptedSource::new(Reply::Price(12.0, CLOSED));
    let cfg = SchedulerConfig {
        force_open: true,
        ..cfg()
    };
    let (_source, repo, _counters, mut sched) = setup(source, cfg).await;

    assert_eq!(sched.step().await.next, Phase::Active);
    let step = sched.step().await;

    assert_eq!(step.next, Phase::Active);
    assert_eq!(sched.market(), CLOSED);
    assert_eq!(repo.snapshot_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_keeps_initial_open_state() {
    let source = ScriptedSource::new(Reply::Price(12.0, OPEN));
    source.script("FR0000120404", &[Reply::NotFound]);

    let (_source, _repo, _counters, mut sched) = setup(source, cfg()).await;

    assert_eq!(sched.step().await.next, Phase::Active);
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_is_survived_and_retried_next_cycle() {
    let (_source, repo, counters, mut sched) =
        setup(ScriptedSource::new(Reply::Price(9.0, OPEN)), cfg()).await;

    sched.step().await;

    repo.failing(true);
    let report = sched.step().await.report.unwrap();
    assert!(!report.persisted);
    assert_eq!(sched.series().len(), 1);
    assert!(repo.series.lock().await.is_empty());
    assert_eq!(counters.persist_failures.load(Ordering::Relaxed), 1);
    assert_eq!(sched.phase(), Phase::Active);

    repo.failing(false);
    let report = sched.step().await.report.unwrap();
    assert!(report.persisted);

    let stored: Vec<u64> = repo.series.lock().await.iter().map(|r| r.seq).collect();
    assert_eq!(stored, vec![0, 1]);

    // The snapshot written is the current one: two cycles of history.
    let snap = repo.snapshot.lock().await.clone().unwrap();
    assert_eq!(snap.rows[0].prices.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn series_writes_only_carry_new_records() {
    let (_source, repo, _counters, mut sched) =
        setup(ScriptedSource::new(Reply::Price(9.0, OPEN)), cfg()).await;

    sched.step().await;
    for _ in 0..4 {
        sched.step().await;
    }

    assert_eq!(*repo.series_batches.lock().await, vec![1, 1, 1, 1]);
    assert_eq!(sched.series().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn cadence_sleeps_the_rest_of_the_period() {
    let source = ScriptedSource::new(Reply::Price(9.0, OPEN)).with_latency(Duration::from_secs(20));
    let (_source, _repo, _counters, mut sched) = setup(source, cfg()).await;

    sched.step().await;
    let step = sched.step().await;

    // All three fetches run concurrently: the cycle takes one latency.
    assert_eq!(step.report.unwrap().elapsed, Duration::from_secs(20));
    assert_eq!(step.sleep, Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn overrunning_cycle_sleeps_zero_but_still_persists() {
    let source = ScriptedSource::new(Reply::Price(9.0, OPEN)).with_latency(Duration::from_secs(75));
    let (_source, repo, _counters, mut sched) = setup(source, cfg()).await;

    sched.step().await;
    let step = sched.step().await;

    assert_eq!(step.sleep, Duration::ZERO);
    assert!(step.report.unwrap().persisted);
    assert_eq!(repo.snapshot_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn bounded_pool_serializes_beyond_the_cap() {
    let source = ScriptedSource::new(Reply::Price(9.0, OPEN)).with_latency(Duration::from_secs(10));
    let cfg = SchedulerConfig {
        concurrency: 2,
        ..cfg()
    };
    let (_source, _repo, _counters, mut sched) = setup(source, cfg).await;

    sched.step().await;
    let report = sched.step().await.report.unwrap();

    // Three fetches, two in flight at a time: two rounds of latency.
    assert_eq!(report.elapsed, Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_restores_windows_and_continues_series() {
    let source = Arc::new(ScriptedSource::new(Reply::Price(7.0, OPEN)));
    let repo = Arc::new(InMemoryRepository::default());

    *repo.previous_rows.lock().await = vec![SnapshotRow {
        component_name: "AIR LIQUIDE".into(),
        instrument_id: "FR0000120073".into(),
        prices: vec![Some(8.0), None, Some(6.0)],
        trend: TrendSignal::Flat,
    }];
    *repo.series.lock().await = vec![
        TrendRecord {
            seq: 0,
            recorded_at: Utc::now(),
            aggregated_trend: 2,
        },
        TrendRecord {
            seq: 1,
            recorded_at: Utc::now(),
            aggregated_trend: -1,
        },
    ];

    let mut sched = CycleScheduler::bootstrap(
        source,
        repo.clone(),
        instruments(),
        cfg(),
        Counters::default(),
    )
    .await
    .unwrap();

    assert_eq!(sched.series().len(), 2);
    assert_eq!(sched.table().rows()[1].window.len(), 3);
    assert!(sched.table().rows()[0].window.is_empty());

    sched.step().await;
    sched.step().await;

    let snap = repo.snapshot.lock().await.clone().unwrap();
    assert_eq!(snap.rows[1].prices, vec![Some(7.0), Some(8.0), None, Some(6.0)]);

    let stored: Vec<u64> = repo.series.lock().await.iter().map(|r| r.seq).collect();
    assert_eq!(stored, vec![0, 1, 2]);
    assert_eq!(*repo.series_batches.lock().await, vec![1]);
}

#[tokio::test]
async fn bootstrap_rejects_empty_instrument_list() {
    let res = CycleScheduler::bootstrap(
        Arc::new(ScriptedSource::new(Reply::Price(1.0, OPEN))),
        Arc::new(InMemoryRepository::default()),
        vec![],
        cfg(),
        Counters::default(),
    )
    .await;

    assert!(res.is_err());
}

#[tokio::test(start_paused = true)]
async fn run_stops_at_cycle_boundary_on_shutdown() {
    let (_source, repo, counters, sched) =
        setup(ScriptedSource::new(Reply::Price(9.0, OPEN)), cfg()).await;

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(rx));

    // Let a few cycles run on virtual time.
    tokio::time::sleep(Duration::from_secs(150)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let completed = counters.cycles_completed.load(Ordering::Relaxed);
    assert_eq!(completed, 3);
    assert_eq!(repo.series.lock().await.len(), 3);
}
