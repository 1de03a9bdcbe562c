//! Asynchronous photo publishing.
//!
//! A [`Dispatcher`] claims pending reports from the [`JobStore`] on a fixed
//! interval and feeds them to a fixed pool of workers, each running the
//! [`JobPipeline`] for one job at a time.

pub mod dispatcher;
pub mod pipeline;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::Dispatcher;
pub use pipeline::{JobOutcome, JobPipeline};
pub use store::{JobStore, PgJobStore, StoreError};
