//! Bounded fan-out / fan-in of one cycle's fetches.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::metrics::counters::Counters;
use crate::quote::errors::FetchErrorKind;
use crate::quote::types::{Instrument, MarketState};
use crate::quote::QuoteSource;

/// Joined results of one cycle's fetches.
#[derive(Clone, Debug, Default)]
pub struct FetchOutcome {
    /// `prices[i]` belongs to `instruments[i]`; `None` when the fetch failed.
    pub prices: Vec<Option<f64>>,

    /// Market states in fetch completion order.
    pub observed: Vec<MarketState>,
}

impl FetchOutcome {
    pub fn absent(&self) -> usize {
        self.prices.iter().filter(|p| p.is_none()).count()
    }
}

/// Fetches every instrument with at most `concurrency` requests in flight and
/// returns once all of them have finished. A failed fetch only blanks its own
/// slot.
pub async fn fetch_all(
    source: &dyn QuoteSource,
    instruments: &[Instrument],
    concurrency: usize,
    counters: &Counters,
) -> FetchOutcome {
    let results: Vec<_> = stream::iter(0..instruments.len())
        .map(|idx| {
            let instrument = &instruments[idx];
            async move { (idx, source.fetch(&instrument.instrument_id).await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = FetchOutcome {
        prices: vec![None; instruments.len()],
        observed: Vec::with_capacity(instruments.len()),
    };

    for (idx, result) in results {
        let instrument = &instruments[idx];
        match result {
            Ok(quote) => {
                outcome.prices[idx] = Some(quote.price);
                outcome.observed.push(quote.market);
            }
            Err(e) => {
                counters.record_fetch_failure(e.kind());
                match e.kind() {
                    FetchErrorKind::NotFound => warn!(
                        instrument_id = %instrument.instrument_id,
                        component = %instrument.component_name,
                        error = %e,
                        "instrument not quotable; price recorded as absent"
                    ),
                    _ => debug!(
                        instrument_id = %instrument.instrument_id,
                        error = %e,
                        "fetch failed; price recorded as absent"
                    ),
                }
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::errors::FetchError;
    use crate::quote::types::Quote;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use tracing_test::traced_test;

    /// Quotes every id except `GONE`, which is reported as not found.
    struct OneMissing;

    #[async_trait]
    impl QuoteSource for OneMissing {
        async fn fetch(&self, instrument_id: &str) -> Result<Quote, FetchError> {
            if instrument_id == "GONE" {
                return Err(FetchError::NotFound(instrument_id.to_string()));
            }
            Ok(Quote {
                price: instrument_id.len() as f64,
                market: MarketState::Open,
            })
        }
    }

    fn instruments() -> Vec<Instrument> {
        vec![
            Instrument::new("A", "A1"),
            Instrument::new("Gone Corp", "GONE"),
            Instrument::new("C", "CCC3"),
        ]
    }

    #[tokio::test]
    #[traced_test]
    async fn not_found_is_absent_and_reported() {
        let counters = Counters::default();
        let out = fetch_all(&OneMissing, &instruments(), 2, &counters).await;

        assert_eq!(out.prices, vec![Some(2.0), None, Some(4.0)]);
        assert_eq!(out.absent(), 1);
        assert_eq!(out.observed.len(), 2);
        assert_eq!(counters.fetch_not_found.load(Ordering::Relaxed), 1);
        assert!(logs_contain("instrument not quotable"));
    }

    #[tokio::test]
    async fn prices_keep_instrument_order_regardless_of_completion() {
        let counters = Counters::default();
        let list: Vec<Instrument> = (1..=25)
            .map(|n| Instrument::new(format!("I{n}"), "x".repeat(n)))
            .collect();

        let out = fetch_all(&OneMissing, &list, 10, &counters).await;

        let expected: Vec<Option<f64>> = (1..=25).map(|n| Some(n as f64)).collect();
        assert_eq!(out.prices, expected);
        assert_eq!(counters.fetch_failures(), 0);
    }
}
