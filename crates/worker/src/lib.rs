//! Background processing for marketplace webhooks and catalog imports.
//!
//! Each queue partition is served by a [`QueueWorker`] that claims jobs
//! from the durable queue and hands them to a [`JobHandler`]. Handlers
//! never retry on their own; they return an error and the runner
//! reschedules the job according to its [`RetryPolicy`].
//!
//! [`RetryPolicy`]: marketsync_core::retry::RetryPolicy

pub mod background;
pub mod catalog_import;
pub mod config;
pub mod error;
pub mod processors;
pub mod rate_limit;
pub mod runner;

pub use error::ProcessError;
pub use runner::{JobHandler, JobOutcome, QueueWorker, WorkerOptions};
