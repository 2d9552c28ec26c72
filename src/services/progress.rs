//! Progress reporting service
//!
//! Separates progress delivery from business logic so different frontends
//! can plug in their own handling. The inference capability reports
//! fractional progress; the invoker routes it through [`MonotonicProgress`]
//! so callers only ever observe non-decreasing values in `[0, 1]`.

use std::sync::{Mutex, PoisonError};

/// Trait for receiving fractional progress during background removal.
///
/// Implementations may be called zero or more times per run. No call is
/// guaranteed, and the final value is not guaranteed to reach 1.0; success
/// and failure are signaled through the run's result, never through
/// progress.
pub trait ProgressReporter: Send + Sync {
    /// Report progress as a fraction in `[0, 1]`
    fn report(&self, fraction: f32);
}

/// No-op progress reporter that discards all updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report(&self, _fraction: f32) {
        // Intentionally empty - discards progress updates
    }
}

/// Closure-backed progress reporter for frontends and tests
pub struct FnProgressReporter<F>(F);

impl<F> FnProgressReporter<F>
where
    F: Fn(f32) + Send + Sync,
{
    /// Wrap a closure as a progress reporter
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> ProgressReporter for FnProgressReporter<F>
where
    F: Fn(f32) + Send + Sync,
{
    fn report(&self, fraction: f32) {
        (self.0)(fraction);
    }
}

/// Monotonic clamp in front of another reporter.
///
/// Values are clamped to `[0, 1]`; non-finite values and regressions below
/// the last delivered value are dropped. This keeps the downstream contract
/// intact even when the underlying capability misbehaves.
pub struct MonotonicProgress<'a> {
    inner: &'a dyn ProgressReporter,
    last: Mutex<f32>,
}

impl<'a> MonotonicProgress<'a> {
    /// Wrap a reporter in the monotonic clamp
    #[must_use]
    pub fn new(inner: &'a dyn ProgressReporter) -> Self {
        Self {
            inner,
            last: Mutex::new(0.0),
        }
    }
}

impl ProgressReporter for MonotonicProgress<'_> {
    fn report(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }
        let clamped = fraction.clamp(0.0, 1.0);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if clamped < *last {
            return;
        }
        *last = clamped;
        drop(last);
        self.inner.report(clamped);
    }
}
