pub mod aggregator;

pub use aggregator::{summarize, Aggregator, LogProgress, ProgressSink, RunPolicy};
