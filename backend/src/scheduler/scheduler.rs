//! Cycle scheduler for the trend engine.
//!
//! Responsibilities:
//! - Probe the exchange state with one sentinel fetch.
//! - While the market is open (or forced open), run one cycle per period:
//!   fetch all instruments, age the windows, classify, aggregate, persist.
//! - While closed, sleep the idle period and re-probe. Windows do not age.
//!
//! Ordering:
//! - All fetches of a cycle are joined before any window is touched.
//! - Persistence of a cycle completes before the next cycle starts.
//! - Cancellation is only observed between steps.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{Instrument as _, debug, error, info, warn};

use crate::aggregate::{AggregatedTrendSeries, aggregate};
use crate::config::SchedulerConfig;
use crate::error::AppError;
use crate::logger::{TraceId, annotate_total, cycle_span, warn_if_slow};
use crate::metrics::counters::Counters;
use crate::quote::QuoteSource;
use crate::quote::types::{Instrument, MarketState};
use crate::scheduler::fanout::fetch_all;
use crate::snapshot::model::history;
use crate::snapshot::{Snapshot, SnapshotRepository};
use crate::time::{display_timestamp, utc_now};
use crate::trend::{TrendClassifier, TrendSignal};
use crate::window::PriceTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// One sentinel fetch to learn the market state.
    Probe,

    /// Polling cycles at the target cadence.
    Active,

    /// Market closed; waiting to re-probe.
    Idle,
}

/// Summary of one active cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub total: i64,
    pub absent: usize,
    pub elapsed: Duration,
    pub persisted: bool,
    pub market: MarketState,
}

/// Outcome of one scheduler step: where to go next and how long to wait first.
#[derive(Clone, Debug)]
pub struct Step {
    pub next: Phase,
    pub sleep: Duration,
    pub report: Option<CycleReport>,
}

/// Sleep that keeps cycles `period` apart. Never negative: an overrunning
/// cycle is followed immediately by the next one.
pub fn remaining_sleep(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

pub struct CycleScheduler {
    source: Arc<dyn QuoteSource>,
    repo: Arc<dyn SnapshotRepository>,
    cfg: SchedulerConfig,
    classifier: TrendClassifier,

    /// Same order as the table rows.
    instruments: Vec<Instrument>,
    table: PriceTable,
    series: AggregatedTrendSeries,

    /// Number of series records known to be stored.
    persisted_len: usize,

    market: MarketState,
    phase: Phase,
    cycle: u64,

    /// Observability counters (does not affect behavior).
    counters: Counters,
}

impl CycleScheduler {
    /// Loads the previous snapshot and series and builds one window per
    /// instrument. Runs once, before the first probe.
    pub async fn bootstrap(
        source: Arc<dyn QuoteSource>,
        repo: Arc<dyn SnapshotRepository>,
        instruments: Vec<Instrument>,
        cfg: SchedulerConfig,
        counters: Counters,
    ) -> anyhow::Result<Self> {
        if instruments.is_empty() {
            return Err(AppError::NoInstruments.into());
        }

        let cfg = cfg.normalized();

        let previous = repo
            .read_snapshot()
            .await
            .context("failed to read previous snapshot")?;
        let records = repo
            .read_series()
            .await
            .context("failed to read aggregated series")?;

        let restored = previous.len();
        let table = PriceTable::restore(instruments, cfg.window_width, history(previous));
        let series = AggregatedTrendSeries::from_records(records);

        info!(
            instruments = table.len(),
            restored_rows = restored,
            series_len = series.len(),
            window = cfg.window_width,
            "trend engine bootstrapped"
        );

        Ok(Self {
            source,
            repo,
            classifier: TrendClassifier::new(cfg.tail_len),
            instruments: table.instruments().cloned().collect(),
            persisted_len: series.len(),
            table,
            series,
            cfg,
            market: MarketState::default(),
            phase: Phase::Probe,
            cycle: 0,
            counters,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn market(&self) -> MarketState {
        self.market
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    pub fn series(&self) -> &AggregatedTrendSeries {
        &self.series
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Runs the current phase once and moves to the next one. The caller is
    /// expected to wait `Step::sleep` before stepping again.
    pub async fn step(&mut self) -> Step {
        let step = match self.phase {
            Phase::Probe => {
                self.probe().await;
                Step {
                    next: self.active_or_idle(),
                    sleep: Duration::ZERO,
                    report: None,
                }
            }
            Phase::Active => {
                let report = self.run_cycle().await;
                Step {
                    next: self.active_or_idle(),
                    sleep: remaining_sleep(self.cfg.cycle_period, report.elapsed),
                    report: Some(report),
                }
            }
            Phase::Idle => {
                self.counters.idle_probes.fetch_add(1, Ordering::Relaxed);
                info!(
                    sleep_secs = self.cfg.idle_period.as_secs(),
                    "market closed; idling before next probe"
                );
                Step {
                    next: Phase::Probe,
                    sleep: self.cfg.idle_period,
                    report: None,
                }
            }
        };

        if step.next != self.phase {
            debug!(from = ?self.phase, to = ?step.next, "phase transition");
        }
        self.phase = step.next;

        step
    }

    /// Steps forever until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(force_open = self.cfg.force_open, "scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let step = self.step().await;

            if let Some(r) = &step.report {
                debug!(
                    cycle = r.cycle,
                    sleep_ms = step.sleep.as_millis() as u64,
                    "cycle done; sleeping"
                );
            }

            if step.sleep.is_zero() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(step.sleep) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles = self.cycle, "scheduler stopped");
    }

    fn active_or_idle(&self) -> Phase {
        if self.market.is_open() || self.cfg.force_open {
            Phase::Active
        } else {
            Phase::Idle
        }
    }

    /// Sentinel fetch on the first instrument. A failed probe keeps the
    /// current state.
    async fn probe(&mut self) {
        let Some(sentinel) = self.instruments.first() else {
            return;
        };

        match self.source.fetch(&sentinel.instrument_id).await {
            Ok(q) => {
                self.market = q.market;
                info!(
                    instrument_id = %sentinel.instrument_id,
                    market = ?self.market,
                    "market state probed"
                );
            }
            Err(e) => {
                self.counters.record_fetch_failure(e.kind());
                warn!(
                    instrument_id = %sentinel.instrument_id,
                    error = %e,
                    market = ?self.market,
                    "probe failed; keeping previous market state"
                );
            }
        }
    }

    /// One full active cycle: fetch → shift/fill → classify → aggregate → persist.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let span = cycle_span(self.cycle, &TraceId::random());
        self.cycle_body().instrument(span).await
    }

    async fn cycle_body(&mut self) -> CycleReport {
        let started = Instant::now();

        let outcome = warn_if_slow(
            "fetch_all",
            self.cfg.cycle_period,
            fetch_all(
                self.source.as_ref(),
                &self.instruments,
                self.cfg.concurrency,
                &self.counters,
            ),
        )
        .await;

        self.market = self.market.reduce(outcome.observed.iter().copied());
        let absent = outcome.absent();

        if let Err(e) = self.table.advance(&outcome.prices) {
            error!(error = %e, "window update rejected; cycle skipped");
            return CycleReport {
                cycle: self.cycle,
                total: 0,
                absent,
                elapsed: started.elapsed(),
                persisted: false,
                market: self.market,
            };
        }

        let signals: Vec<TrendSignal> = self
            .table
            .rows()
            .iter()
            .map(|row| self.classifier.classify_window(&row.window))
            .collect();

        let total = aggregate(&signals);
        annotate_total(total);

        let now = utc_now();
        self.series.append(now, total);

        let snapshot = Snapshot::build(&self.table, &signals, total, now);
        let persisted = self.persist(&snapshot).await;

        self.counters.cycles_completed.fetch_add(1, Ordering::Relaxed);

        info!(
            cycle = self.cycle,
            total,
            absent,
            market = ?self.market,
            at = %display_timestamp(&now),
            "snapshot taken"
        );

        CycleReport {
            cycle: self.cycle,
            total,
            absent,
            elapsed: started.elapsed(),
            persisted,
            market: self.market,
        }
    }

    /// Writes the snapshot and every series record not stored yet. On failure
    /// the records stay pending and go out with the next cycle's write.
    async fn persist(&mut self, snapshot: &Snapshot) -> bool {
        let pending = &self.series.records()[self.persisted_len..];

        let result = warn_if_slow("persist", Duration::from_secs(1), async {
            self.repo.write_snapshot(snapshot).await?;
            self.repo.write_series(pending).await
        }
        .boxed())
        .await;

        match result {
            Ok(()) => {
                self.persisted_len = self.series.len();
                true
            }
            Err(e) => {
                self.counters.persist_failures.fetch_add(1, Ordering::Relaxed);
                let e = AppError::Persistence(format!("{e:#}"));
                error!(
                    error = %e,
                    pending = self.series.len() - self.persisted_len,
                    "persistence failed; retrying with next cycle"
                );
                false
            }
        }
    }
}
