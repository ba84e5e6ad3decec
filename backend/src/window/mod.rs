//! Fixed-width price history keyed by age.
//!
//! Age 1 is the most recent sample. Every active cycle ages all samples by one
//! and writes the new observation at age 1; anything older than the window
//! width is discarded for good.

mod table;

pub use table::{PriceTable, TableRow};

use std::collections::VecDeque;

/// One instrument's price history.
///
/// `None` marks a cycle whose fetch failed. Absent cells are kept so that
/// ages stay aligned across instruments and cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceWindow {
    /// Front = age 1 (newest), back = oldest.
    cells: VecDeque<Option<f64>>,

    /// Maximum number of ages retained (W).
    width: usize,
}

impl PriceWindow {
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            cells: VecDeque::with_capacity(width),
            width,
        }
    }

    /// Rebuilds a window from cells ordered newest first, truncated to `width`.
    pub fn from_newest_first(width: usize, cells: impl IntoIterator<Item = Option<f64>>) -> Self {
        let mut w = Self::new(width);
        w.cells.extend(cells.into_iter().take(w.width));
        w
    }

    /// Ages every sample by one. The sample at age W (if any) is evicted and a
    /// vacant age-1 cell is opened for [`PriceWindow::set_latest`].
    pub fn shift(&mut self) {
        if self.cells.len() >= self.width {
            self.cells.truncate(self.width - 1);
        }
        self.cells.push_front(None);
    }

    /// Writes the newly fetched value into age 1.
    pub fn set_latest(&mut self, price: Option<f64>) {
        match self.cells.front_mut() {
            Some(cell) => *cell = price,
            None => self.cells.push_front(price),
        }
    }

    /// Sample at `age` (1-based). `None` for out-of-range ages and absent cells.
    pub fn at_age(&self, age: usize) -> Option<f64> {
        if age == 0 {
            return None;
        }
        self.cells.get(age - 1).copied().flatten()
    }

    pub fn latest(&self) -> Option<f64> {
        self.at_age(1)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn newest_first(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.cells.iter().copied()
    }

    /// Cells ordered oldest to newest, the order the trend classifier reads.
    pub fn oldest_first(&self) -> Vec<Option<f64>> {
        self.cells.iter().rev().copied().collect()
    }
}
