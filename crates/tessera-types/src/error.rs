//! Error types and failure taxonomy.

use std::time::Duration;
use thiserror::Error;

/// HTTP statuses that are worth retrying.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Result type alias for single-request operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Where a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The server answered with a non-2xx status.
    Http,
    /// No HTTP response was obtained (DNS, refused or reset connection).
    Network,
    /// The per-call deadline elapsed.
    Timeout,
    /// A 2xx response whose body could not be decoded.
    Decode,
    /// The request could not be built (invalid header or URL).
    Request,
}

/// A failed request against the remote API.
///
/// Constructed once at the failure site and never mutated afterwards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    message: String,
    status: u16,
    status_text: String,
    body: Option<String>,
    kind: ApiErrorKind,
}

impl ApiError {
    /// Creates an error for a non-2xx HTTP response.
    #[must_use]
    pub fn http(
        status: u16,
        status_text: impl Into<String>,
        body: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            status,
            status_text: status_text.into(),
            body,
            kind: ApiErrorKind::Http,
        }
    }

    /// Creates an error for a transport failure before any response arrived.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 0,
            status_text: String::new(),
            body: None,
            kind: ApiErrorKind::Network,
        }
    }

    /// Creates an error for an exceeded per-call deadline.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self {
            message: format!("Request timeout after {}ms", after.as_millis()),
            status: 0,
            status_text: String::new(),
            body: None,
            kind: ApiErrorKind::Timeout,
        }
    }

    /// Creates an error for a successful response with an undecodable body.
    #[must_use]
    pub fn decode(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self {
            message: message.into(),
            status,
            status_text: String::new(),
            body,
            kind: ApiErrorKind::Decode,
        }
    }

    /// Creates an error for a request that could not be built.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 0,
            status_text: String::new(),
            body: None,
            kind: ApiErrorKind::Request,
        }
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, or 0 when no response was obtained.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the HTTP status text (reason phrase).
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Returns the raw response body, if any was read.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns where the request failed.
    #[must_use]
    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Returns true if the failure happened below HTTP.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Network)
    }

    /// Returns true if the per-call deadline elapsed.
    #[must_use]
    pub const fn is_timeout_error(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Timeout)
    }

    /// Returns true for network errors, timeouts, and retryable HTTP statuses.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_network_error()
            || self.is_timeout_error()
            || (matches!(self.kind, ApiErrorKind::Http) && RETRYABLE_STATUSES.contains(&self.status))
    }

    /// Returns the failure category derived from the structured fields.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            ApiErrorKind::Timeout => ErrorCategory::Timeout,
            ApiErrorKind::Network => ErrorCategory::Network,
            ApiErrorKind::Decode | ApiErrorKind::Request => ErrorCategory::Unknown,
            ApiErrorKind::Http => match self.status {
                408 => ErrorCategory::Timeout,
                429 => ErrorCategory::RateLimit,
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::from_message(&self.message),
            },
        }
    }
}

/// Failure category used to drive retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Per-call deadline exceeded.
    Timeout,
    /// Connection reset or refused, DNS failure.
    Network,
    /// HTTP 429 or an explicit throttling message.
    RateLimit,
    /// HTTP 401/403.
    Auth,
    /// HTTP 404.
    NotFound,
    /// HTTP 5xx.
    Server,
    /// A cancellation signal was observed.
    Abort,
    /// Unrecognized failure shape.
    Unknown,
}

impl ErrorCategory {
    /// Returns the category name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::RateLimit => "RATE_LIMIT_ERROR",
            Self::Auth => "AUTH_ERROR",
            Self::NotFound => "NOT_FOUND_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::Abort => "ABORT_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Returns true if failures of this category are retried by default.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network | Self::RateLimit | Self::Server
        )
    }

    /// Classifies a failure that only carries a message.
    ///
    /// Errors produced by this workspace carry their category directly; this is
    /// the fallback for foreign errors surfacing from caller operations.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        let msg = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

        if has(&["abort", "cancelled", "canceled"]) {
            Self::Abort
        } else if has(&["timeout", "timed out", "etimedout"]) {
            Self::Timeout
        } else if has(&["429", "rate limit", "too many requests", "throttl"]) {
            Self::RateLimit
        } else if has(&["401", "403", "unauthorized", "forbidden"]) {
            Self::Auth
        } else if has(&["404", "not found"]) {
            Self::NotFound
        } else if has(&[
            "500",
            "502",
            "503",
            "504",
            "internal server error",
            "bad gateway",
            "service unavailable",
        ]) {
            Self::Server
        } else if has(&[
            "econnreset",
            "econnrefused",
            "enotfound",
            "socket hang up",
            "network",
            "connection",
            "dns",
        ]) {
            Self::Network
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can be sorted into an [`ErrorCategory`].
pub trait Categorize {
    /// Returns the category of this failure.
    fn category(&self) -> ErrorCategory;
}

impl Categorize for ApiError {
    fn category(&self) -> ErrorCategory {
        Self::category(self)
    }
}

impl Categorize for String {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::from_message(self)
    }
}

impl Categorize for &str {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::from_message(self)
    }
}

impl Categorize for Box<dyn std::error::Error + Send + Sync> {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::from_message(&self.to_string())
    }
}
