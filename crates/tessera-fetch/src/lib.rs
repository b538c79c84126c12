//! Rate-limited request execution for the tessera API access layer.
//!
//! This crate provides the network pipeline:
//!
//! - [`RateLimitGate`] - Process-wide FIFO spacing of outbound requests
//! - [`ApiClient`] - One authenticated request per call, with a hard timeout
//! - [`PaginatedFetcher`] - Continuation-token pagination with a page cap
//! - [`PageSource`] - The seam between pagination and the transport

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tessera-rs/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod gate;
mod paginate;

pub use client::{ApiClient, Endpoint, Params};
pub use gate::RateLimitGate;
pub use paginate::{PageSource, PaginatedFetcher};
pub use reqwest::Method;
