//! Cross-cutting services shared by the pipeline and session

pub mod progress;

pub use progress::{FnProgressReporter, MonotonicProgress, NoOpProgressReporter, ProgressReporter};
