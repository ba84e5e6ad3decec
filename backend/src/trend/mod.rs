//! Trend classifier.
//!
//! Flags a fresh breakout: the window's extreme was set within the most recent
//! `tail_len` ages and has not been touched anywhere else in the window.

use crate::window::PriceWindow;

/// Ternary per-instrument trend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrendSignal {
    LowerLow,
    Flat,
    HigherHigh,
}

impl TrendSignal {
    pub fn value(self) -> i64 {
        match self {
            TrendSignal::LowerLow => -1,
            TrendSignal::Flat => 0,
            TrendSignal::HigherHigh => 1,
        }
    }

    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            -1 => Some(TrendSignal::LowerLow),
            0 => Some(TrendSignal::Flat),
            1 => Some(TrendSignal::HigherHigh),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TrendClassifier {
    tail_len: usize,
}

impl Default for TrendClassifier {
    fn default() -> Self {
        Self { tail_len: 5 }
    }
}

impl TrendClassifier {
    pub fn new(tail_len: usize) -> Self {
        Self {
            tail_len: tail_len.max(1),
        }
    }

    pub fn tail_len(&self) -> usize {
        self.tail_len
    }

    pub fn classify_window(&self, window: &PriceWindow) -> TrendSignal {
        classify(&window.oldest_first(), self.tail_len)
    }
}

/// Running extreme over present samples.
#[derive(Clone, Copy)]
struct Extreme {
    value: f64,
    index: usize,
    count: usize,
}

impl Extreme {
    fn observe(slot: &mut Option<Extreme>, index: usize, value: f64, better: fn(f64, f64) -> bool) {
        match slot {
            None => {
                *slot = Some(Extreme {
                    value,
                    index,
                    count: 1,
                })
            }
            Some(e) if better(value, e.value) => {
                *e = Extreme {
                    value,
                    index,
                    count: 1,
                }
            }
            Some(e) if value == e.value => e.count += 1,
            Some(_) => {}
        }
    }

    fn is_unique_in_tail(&self, tail_start: usize) -> bool {
        self.count == 1 && self.index >= tail_start
    }
}

/// Classifies one window given oldest to newest.
///
/// - `HigherHigh` iff the maximum lies within the last `tail_len` ages and
///   occurs exactly once in the whole window.
/// - otherwise `LowerLow` iff the same holds for the minimum.
/// - otherwise `Flat`.
///
/// Absent cells take no part in max/min/uniqueness but still occupy their age,
/// so the tail is always the last `tail_len` positions.
pub fn classify(prices: &[Option<f64>], tail_len: usize) -> TrendSignal {
    let tail_start = prices.len().saturating_sub(tail_len);

    let mut max: Option<Extreme> = None;
    let mut min: Option<Extreme> = None;

    for (index, value) in prices
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.map(|v| (i, v)))
        .filter(|(_, v)| v.is_finite())
    {
        Extreme::observe(&mut max, index, value, |a, b| a > b);
        Extreme::observe(&mut min, index, value, |a, b| a < b);
    }

    match (max, min) {
        (Some(hi), _) if hi.is_unique_in_tail(tail_start) => TrendSignal::HigherHigh,
        (_, Some(lo)) if lo.is_unique_in_tail(tail_start) => TrendSignal::LowerLow,
        _ => TrendSignal::Flat,
    }
}
