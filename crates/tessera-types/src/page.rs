//! Pagination envelopes.

use serde::{Deserialize, Serialize};

/// One physical page returned by a paginated endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items carried by this page, in server order.
    pub items: Vec<T>,
    /// Opaque token for the next page. Absent or empty means last page.
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page with an optional continuation token.
    #[must_use]
    pub const fn new(items: Vec<T>, continuation: Option<String>) -> Self {
        Self {
            items,
            continuation,
        }
    }

    /// Creates a final page.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Returns the continuation token if it can be trusted.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.continuation.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns true if no further page follows.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_token().is_none()
    }
}

/// The accumulated result of following continuation tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// All items, concatenated in page order.
    pub items: Vec<T>,
    /// Number of pages fetched.
    pub pages: usize,
    /// True if the page cap stopped the fetch while more data was available.
    pub truncated: bool,
}

impl<T> Paginated<T> {
    /// Returns the number of items.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no items were fetched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the result, returning only the items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_last() {
        let page = Page::new(vec![1, 2], Some(String::new()));
        assert!(page.is_last());
        assert_eq!(page.next_token(), None);
    }

    #[test]
    fn test_token_present() {
        let page = Page::new(vec![1], Some("P2".to_string()));
        assert!(!page.is_last());
        assert_eq!(page.next_token(), Some("P2"));
        assert!(Page::<u8>::last(vec![]).is_last());
    }

    #[test]
    fn test_paginated_accessors() {
        let result = Paginated {
            items: vec!["a", "b"],
            pages: 1,
            truncated: false,
        };
        assert_eq!(result.len(), 2);
        assert!(!result.is_empty());
        assert_eq!(result.into_items(), vec!["a", "b"]);
    }
}
