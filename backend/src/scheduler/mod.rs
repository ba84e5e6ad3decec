pub mod fanout;
pub mod scheduler;

pub use scheduler::{CycleReport, CycleScheduler, Phase, Step, remaining_sleep};
