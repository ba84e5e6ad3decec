use serde::{Deserialize, Serialize};

/// Exchange trading state as reported alongside a price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MarketState {
    #[default]
    Open,

    Closed,
}

/// Status text the exchange shows while the order book is trading.
pub const CONTINUOUS_TRADING: &str = "CONTINUOUS TRADING";

impl MarketState {
    /// Maps the raw status text to a state. A missing status counts as closed.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some(s) if s.trim().eq_ignore_ascii_case(CONTINUOUS_TRADING) => MarketState::Open,
            _ => MarketState::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, MarketState::Open)
    }

    /// Last-observation-wins reducer.
    ///
    /// Whichever fetch completed last decides the state for the whole index;
    /// there is no vote across instruments. With no observation the current
    /// state is kept.
    pub fn reduce<I>(self, observations: I) -> Self
    where
        I: IntoIterator<Item = MarketState>,
    {
        observations.into_iter().last().unwrap_or(self)
    }
}

/// Result of one successful fetch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quote {
    /// Last traded price rounded to 2 decimals.
    pub price: f64,

    /// Trading state observed on the same response.
    pub market: MarketState,
}

/// One index constituent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub component_name: String,
    pub instrument_id: String,
}

impl Instrument {
    pub fn new(component_name: impl Into<String>, instrument_id: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            instrument_id: instrument_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_maps_to_state() {
        assert_eq!(
            MarketState::from_status(Some(" CONTINUOUS TRADING ")),
            MarketState::Open
        );
        assert_eq!(
            MarketState::from_status(Some("Continuous Trading")),
            MarketState::Open
        );
        assert_eq!(
            MarketState::from_status(Some("CLOSED")),
            MarketState::Closed
        );
        assert_eq!(MarketState::from_status(None), MarketState::Closed);
    }

    #[test]
    fn reducer_keeps_last_observation_only() {
        // A single closed reading after many open ones flips the whole index.
        let obs = vec![
            MarketState::Open,
            MarketState::Open,
            MarketState::Open,
            MarketState::Closed,
        ];
        assert_eq!(MarketState::Open.reduce(obs), MarketState::Closed);

        let obs = vec![MarketState::Closed, MarketState::Open];
        assert_eq!(MarketState::Closed.reduce(obs), MarketState::Open);
    }

    #[test]
    fn reducer_without_observation_keeps_state() {
        assert_eq!(
            MarketState::Closed.reduce(std::iter::empty()),
            MarketState::Closed
        );
    }
}
