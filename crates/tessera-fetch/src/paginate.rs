//! Continuation-token pagination.

use crate::{Endpoint, Params};
use async_trait::async_trait;
use tessera_types::{DEFAULT_MAX_PAGES, DEFAULT_TOKEN_NAME, Page, Paginated, Result};
use tracing::warn;

/// Something that can fetch a single page of an endpoint.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// The item type carried by pages.
    type Item: Send;

    /// Fetches one page with the given parameters.
    async fn fetch_page(&self, endpoint: &Endpoint, params: &Params) -> Result<Page<Self::Item>>;

    /// Request parameter that carries the previous page's continuation token.
    fn token_param(&self) -> &str {
        DEFAULT_TOKEN_NAME
    }
}

/// Presents a multi-page fetch as one logical call.
#[derive(Debug, Clone)]
pub struct PaginatedFetcher<S> {
    source: S,
    max_pages: usize,
}

impl<S: PageSource> PaginatedFetcher<S> {
    /// Creates a fetcher with the default page cap.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self::with_max_pages(source, DEFAULT_MAX_PAGES)
    }

    /// Creates a fetcher with an explicit page cap. A cap of zero is treated as one.
    #[must_use]
    pub const fn with_max_pages(source: S, max_pages: usize) -> Self {
        Self {
            source,
            max_pages: if max_pages == 0 { 1 } else { max_pages },
        }
    }

    /// Returns the page cap.
    #[must_use]
    pub const fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Returns the underlying page source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Fetches pages until one carries no continuation token or the cap is hit.
    ///
    /// Each request after the first carries the previous page's token merged
    /// into `params`. Hitting the cap while a token is still present is not an
    /// error; the result is flagged as truncated instead.
    ///
    /// # Errors
    ///
    /// Returns the first page error unchanged. Items from earlier pages are discarded.
    pub async fn fetch_all(&self, endpoint: &Endpoint, params: &Params) -> Result<Paginated<S::Item>> {
        let mut params = params.clone();
        let mut items = Vec::new();
        let mut pages = 0;

        loop {
            let page = self.source.fetch_page(endpoint, &params).await?;
            pages += 1;

            let token = page.next_token().map(str::to_owned);
            items.extend(page.items);

            match token {
                None => {
                    return Ok(Paginated {
                        items,
                        pages,
                        truncated: false,
                    });
                }
                Some(_) if pages >= self.max_pages => {
                    warn!(
                        path = endpoint.path(),
                        pages,
                        items = items.len(),
                        "page cap reached with more data available; result truncated"
                    );
                    return Ok(Paginated {
                        items,
                        pages,
                        truncated: true,
                    });
                }
                Some(token) => {
                    params.insert(self.source.token_param().to_string(), token);
                }
            }
        }
    }
}
