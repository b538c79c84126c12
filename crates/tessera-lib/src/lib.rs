//! Client-side access layer for quota-bound financial data APIs.
//!
//! This is a facade crate that re-exports functionality from the tessera
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use tessera_lib::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         api_key: std::env::var("TESSERA_API_KEY")?,
//!         plan: PlanTier::Light,
//!         ..Default::default()
//!     };
//!     let gate = RateLimitGate::for_plan(config.plan);
//!     let client = ApiClient::new(config, gate)?;
//!
//!     let executor = BatchExecutor::new(BatchConfig::default());
//!     let endpoint = Endpoint::get("/equities/bars/daily").with_items_key("data");
//!     let codes = ["7203", "6758", "9984"];
//!
//!     let operations = codes.iter().map(|code| {
//!         let client = client.clone();
//!         let endpoint = endpoint.clone();
//!         let params = Params::from([("code".to_string(), code.to_string())]);
//!         move || {
//!             let client = client.clone();
//!             let endpoint = endpoint.clone();
//!             let params = params.clone();
//!             async move { client.fetch_all_pages(&endpoint, &params, 10).await }
//!         }
//!     });
//!
//!     let options = BatchRunOptions::new().with_concurrency(3);
//!     for page in executor.execute_all(operations, &options).await? {
//!         println!("{} rows in {} page(s)", page.len(), page.pages);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/tessera-rs/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use tessera_types::*;

// Re-export the network side
#[cfg(feature = "fetch")]
pub use tessera_fetch::{ApiClient, Endpoint, Method, PageSource, PaginatedFetcher, Params, RateLimitGate};

// Re-export resilience
#[cfg(feature = "batch")]
pub use tessera_batch::{
    BatchError, BatchExecutor, BatchFailure, BatchReport, BatchRunOptions, CancellationToken,
    ProgressFn, RetryPredicate, backoff_delay, run_batch, run_resilient,
};

/// Prelude module for convenient imports.
///
/// ```
/// use tessera_lib::prelude::*;
/// ```
pub mod prelude {
    pub use tessera_types::{
        ApiError, BatchConfig, Categorize, ClientConfig, ErrorCategory, Page, Paginated, PlanTier,
        Result, Settings,
    };

    #[cfg(feature = "fetch")]
    pub use tessera_fetch::{ApiClient, Endpoint, PaginatedFetcher, Params, RateLimitGate};

    #[cfg(feature = "batch")]
    pub use tessera_batch::{
        BatchError, BatchExecutor, BatchReport, BatchRunOptions, CancellationToken,
    };
}
