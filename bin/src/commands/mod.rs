//! CLI command implementations.

use crate::display::Format;
use std::path::PathBuf;
use tessera_lib::prelude::*;

pub(crate) mod batch;
pub(crate) mod fetch;
pub(crate) mod plans;

/// A resolved request description shared by `fetch` and `batch`.
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) path: String,
    pub(crate) params: Params,
    pub(crate) post: bool,
    pub(crate) items_key: Option<String>,
    pub(crate) max_pages: Option<usize>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) format: Format,
}

impl Request {
    /// Builds the endpoint this request targets.
    pub(crate) fn endpoint(&self) -> Endpoint {
        let endpoint = if self.post {
            Endpoint::post(self.path.as_str())
        } else {
            Endpoint::get(self.path.as_str())
        };
        match &self.items_key {
            Some(key) => endpoint.with_items_key(key.as_str()),
            None => endpoint,
        }
    }

    /// Returns the page cap, falling back to the configured one.
    pub(crate) fn max_pages(&self, settings: &Settings) -> usize {
        self.max_pages.unwrap_or(settings.client.max_pages)
    }
}
