use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::quote::errors::FetchErrorKind;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub cycles_completed: Arc<AtomicU64>,
    pub idle_probes: Arc<AtomicU64>,

    // fetch failures by kind
    pub fetch_transient: Arc<AtomicU64>,
    pub fetch_not_found: Arc<AtomicU64>,
    pub fetch_parse: Arc<AtomicU64>,
    pub fetch_rejected: Arc<AtomicU64>,

    pub persist_failures: Arc<AtomicU64>,
}

impl Counters {
    pub fn record_fetch_failure(&self, kind: FetchErrorKind) {
        let c = match kind {
            FetchErrorKind::Transient => &self.fetch_transient,
            FetchErrorKind::NotFound => &self.fetch_not_found,
            FetchErrorKind::Parse => &self.fetch_parse,
            FetchErrorKind::Rejected => &self.fetch_rejected,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failures(&self) -> u64 {
        [
            &self.fetch_transient,
            &self.fetch_not_found,
            &self.fetch_parse,
            &self.fetch_rejected,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }
}
