//! Implementation of different callback functions.
use crate::diagnostics::BatchSummary;
use log::info;

/// Trait for implementing callbacks for batched MC integrations
pub trait Callback {
    /// This method is called after each finished batch with the estimates after every batch so
    /// far, and may report on them.
    fn print(&self, batches: &[BatchSummary]);
}

/// A callback function that does nothing
pub struct SinkCallback {}

impl Callback for SinkCallback {
    fn print(&self, _: &[BatchSummary]) {}
}

/// A callback function that logs the cumulative result after each batch at info level
pub struct SimpleCallback {}

impl Callback for SimpleCallback {
    fn print(&self, batches: &[BatchSummary]) {
        // Make sure that there is at least one batch
        // otherwise do nothing.
        if let Some(summary) = batches.last() {
            info!(
                "batch {} finished: N={} E={} \u{b1} {} neff={:.1}",
                batches.len() - 1,
                summary.calls,
                summary.integral,
                summary.variance.sqrt(),
                summary.neff
            );
        }
    }
}
