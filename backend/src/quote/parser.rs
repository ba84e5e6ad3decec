use scraper::{Html, Selector};

use crate::quote::errors::FetchError;
use crate::quote::types::{MarketState, Quote};

pub const PRICE_SELECTOR: &str = "#header-instrument-price";
pub const STATUS_SELECTOR: &str = "#instrstatusl1";

/// Extracts price and trading status from a detailed-quote HTML fragment.
#[derive(Clone, Debug)]
pub struct QuoteParser {
    price: Selector,
    status: Selector,
}

impl QuoteParser {
    pub fn new(price_selector: &str, status_selector: &str) -> Result<Self, FetchError> {
        let price =
            Selector::parse(price_selector).map_err(|e| FetchError::Selector(e.to_string()))?;
        let status =
            Selector::parse(status_selector).map_err(|e| FetchError::Selector(e.to_string()))?;

        Ok(Self { price, status })
    }

    pub fn euronext() -> Result<Self, FetchError> {
        Self::new(PRICE_SELECTOR, STATUS_SELECTOR)
    }

    pub fn parse(&self, body: &str) -> Result<Quote, FetchError> {
        let doc = Html::parse_fragment(body);

        let price_text = doc
            .select(&self.price)
            .next()
            .map(|el| el.text().collect::<String>())
            .ok_or(FetchError::MissingPrice)?;

        let status_text = doc
            .select(&self.status)
            .next()
            .map(|el| el.text().collect::<String>());

        Ok(Quote {
            price: parse_price(&price_text)?,
            market: MarketState::from_status(status_text.as_deref()),
        })
    }
}

/// Parses a displayed price: thousands separators are stripped and the value
/// is rounded to 2 decimals.
pub fn parse_price(raw: &str) -> Result<f64, FetchError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();

    let value: f64 = cleaned
        .parse()
        .map_err(|_| FetchError::Parse(raw.trim().to_string()))?;

    if !value.is_finite() {
        return Err(FetchError::Parse(raw.trim().to_string()));
    }

    Ok(round2(value))
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
