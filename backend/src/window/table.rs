use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::quote::types::Instrument;
use crate::window::PriceWindow;

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub instrument: Instrument,
    pub window: PriceWindow,
}

/// All instrument windows of one run, one row per instrument id.
///
/// The table only changes through [`PriceTable::advance`], which shifts and
/// fills every row in one step.
#[derive(Clone, Debug, Default)]
pub struct PriceTable {
    rows: Vec<TableRow>,
    width: usize,
}

impl PriceTable {
    pub fn new(instruments: Vec<Instrument>, width: usize) -> Self {
        Self::restore(instruments, width, std::iter::empty())
    }

    /// Builds the table for `instruments`, reusing prior history keyed by
    /// instrument id (cells newest first). History for unknown ids is dropped;
    /// duplicate instrument ids keep their first occurrence.
    pub fn restore<I>(instruments: Vec<Instrument>, width: usize, previous: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Option<f64>>)>,
    {
        let mut previous: HashMap<String, Vec<Option<f64>>> = previous.into_iter().collect();
        let mut seen = HashSet::new();

        let rows = instruments
            .into_iter()
            .filter(|i| seen.insert(i.instrument_id.clone()))
            .map(|instrument| {
                let window = match previous.remove(&instrument.instrument_id) {
                    Some(cells) => PriceWindow::from_newest_first(width, cells),
                    None => PriceWindow::new(width),
                };
                TableRow { instrument, window }
            })
            .collect();

        Self {
            rows,
            width: width.max(1),
        }
    }

    /// Shifts every row and writes `prices[i]` into row `i` at age 1.
    ///
    /// Rejects the update without touching any row when the price count does
    /// not match the row count.
    pub fn advance(&mut self, prices: &[Option<f64>]) -> Result<(), AppError> {
        if prices.len() != self.rows.len() {
            return Err(AppError::WindowMismatch {
                expected: self.rows.len(),
                got: prices.len(),
            });
        }

        for (row, price) in self.rows.iter_mut().zip(prices) {
            row.window.shift();
            row.window.set_latest(*price);
        }

        Ok(())
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.rows.iter().map(|r| &r.instrument)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}
