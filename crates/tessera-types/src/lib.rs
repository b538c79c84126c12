//! Core types for the tessera API access layer.
//!
//! This crate provides the plain data structures shared by the other crates:
//!
//! - [`PlanTier`] - Subscription tier and its requests-per-minute budget
//! - [`ApiError`] - A failed request, tagged at its origin
//! - [`ErrorCategory`] - Retry-oriented failure taxonomy
//! - [`Page`] / [`Paginated`] - Pagination envelopes
//! - [`ClientConfig`] / [`BatchConfig`] / [`Settings`] - Configuration surface

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tessera-rs/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod page;
mod plan;

pub use config::{
    BatchConfig, ClientConfig, ConfigError, DEFAULT_API_KEY_HEADER, DEFAULT_BASE_URL,
    DEFAULT_MAX_PAGES, DEFAULT_TIMEOUT, DEFAULT_TOKEN_NAME, Settings,
};
pub use error::{ApiError, ApiErrorKind, Categorize, ErrorCategory, RETRYABLE_STATUSES, Result};
pub use page::{Page, Paginated};
pub use plan::{PlanTier, PlanTierParseError, SPACING_MARGIN, min_interval_ms};
