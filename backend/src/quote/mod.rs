//! Quote source.
//!
//! Fetches one instrument's last traded price together with the exchange
//! trading status. Retry policy lives here; callers only ever see the final
//! outcome of a fetch.

pub mod client;
pub mod errors;
pub mod parser;
pub mod retry;
pub mod types;

use async_trait::async_trait;

pub use client::EuronextClient;
pub use errors::{FetchError, FetchErrorKind};
pub use retry::RetryPolicy;
pub use types::*;

/// Seam between the scheduler and the market-data transport.
///
/// Implementations must be stateless across calls: the observed market state
/// travels back inside the returned [`Quote`].
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, instrument_id: &str) -> Result<Quote, FetchError>;
}
