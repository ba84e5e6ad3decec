use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("window update rejected: expected {expected} prices, got {got}")]
    WindowMismatch { expected: usize, got: usize },

    #[error("no instruments available to track")]
    NoInstruments,

    #[error("invalid configuration: {0}")]
    Config(String),
}
