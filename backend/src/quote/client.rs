use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::quote::QuoteSource;
use crate::quote::errors::FetchError;
use crate::quote::parser::QuoteParser;
use crate::quote::retry::{RetryPolicy, with_retry};
use crate::quote::types::Quote;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
const FORM_BODY: &str = "theme_name=euronext_live";

/// Detailed-quote client for Euronext Live.
///
/// One `POST {endpoint}/{instrument_id}` per attempt; the HTML fragment in the
/// response carries the last traded price and the trading status.
#[derive(Clone)]
pub struct EuronextClient {
    http: Client,
    endpoint: String,
    parser: Arc<QuoteParser>,
    retry: RetryPolicy,
}

impl EuronextClient {
    pub fn new(endpoint: String, timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(default_headers())
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            parser: Arc::new(QuoteParser::euronext()?),
            retry,
        })
    }

    pub fn quote_url(&self, instrument_id: &str) -> String {
        format!("{}/{}", self.endpoint, instrument_id)
    }

    /// Single attempt, no retry.
    async fn fetch_once(&self, instrument_id: &str) -> Result<Quote, FetchError> {
        let resp = self
            .http
            .post(self.quote_url(instrument_id))
            .body(FORM_BODY)
            .send()
            .await?;

        check_status(resp.status(), instrument_id)?;

        let body = resp.text().await?;
        let quote = self.parser.parse(&body)?;

        debug!(price = quote.price, market = ?quote.market, "quote fetched");

        Ok(quote)
    }
}

#[async_trait]
impl QuoteSource for EuronextClient {
    #[instrument(
        skip(self),
        fields(instrument_id = %instrument_id),
        level = "debug"
    )]
    async fn fetch(&self, instrument_id: &str) -> Result<Quote, FetchError> {
        with_retry(self.retry, |_| self.fetch_once(instrument_id)).await
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
    );
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers
}

/// 404 means the instrument is gone; any other non-2xx is a refusal.
pub fn check_status(status: StatusCode, instrument_id: &str) -> Result<(), FetchError> {
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(instrument_id.to_string()));
    }
    if !status.is_success() {
        return Err(FetchError::UnexpectedStatus(status.as_u16()));
    }
    Ok(())
}
