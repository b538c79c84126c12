//! Resilient execution for the tessera API access layer.
//!
//! This crate provides:
//!
//! - [`BatchExecutor::execute`] - Retry with capped exponential backoff
//! - [`BatchExecutor::execute_all`] - Ordered or bounded-concurrency batches
//! - [`BatchExecutor::run_report`] - Per-operation batch outcomes
//! - [`BatchError`] - Aggregate failures naming attempts and the last cause

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tessera-rs/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod executor;
mod run;

pub use error::BatchError;
pub use executor::{BatchExecutor, RetryPredicate, backoff_delay, run_resilient};
pub use run::{BatchFailure, BatchReport, BatchRunOptions, ProgressFn, run_batch};
pub use tokio_util::sync::CancellationToken;
