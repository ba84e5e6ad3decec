pub mod aggregate;
pub mod config;
pub mod db;
pub mod metrics;
pub mod quote;
pub mod scheduler;
pub mod snapshot;
pub mod trend;
pub mod window;

pub mod error;
pub mod logger;
pub mod time;
