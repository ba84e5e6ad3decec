use thiserror::Error;

/// How the scheduler and the retry wrapper treat a failed fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connection or timeout problem; worth another attempt.
    Transient,

    /// The instrument is no longer quotable.
    NotFound,

    /// The response arrived but could not be decoded.
    Parse,

    /// Any other refusal by the endpoint.
    Rejected,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("instrument not quotable: {0}")]
    NotFound(String),

    #[error("unexpected http status {0}")]
    UnexpectedStatus(u16),

    #[error("price element missing from quote page")]
    MissingPrice,

    #[error("numeric parse error: {0}")]
    Parse(String),

    #[error("http error: {0}")]
    Transport(String),

    #[error("invalid selector: {0}")]
    Selector(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Timeout | FetchError::Connection(_) => FetchErrorKind::Transient,
            FetchError::NotFound(_) | FetchError::MissingPrice => FetchErrorKind::NotFound,
            FetchError::Parse(_) => FetchErrorKind::Parse,
            FetchError::UnexpectedStatus(_) | FetchError::Transport(_) | FetchError::Selector(_) => {
                FetchErrorKind::Rejected
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == FetchErrorKind::Transient
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() {
            FetchError::Connection(e.to_string())
        } else if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
