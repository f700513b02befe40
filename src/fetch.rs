//! Fetcher interface to the excluded crawler collaborators.
//!
//! The core never fetches anything itself. A host wires in a [`Fetcher`] per
//! deployment (HTML crawler, video-channel API client, a stub in tests) and
//! the check cycle drives it under a cooperative cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::monitor::Monitor;
use crate::teaser::{ContentKind, Teaser};

/// What a monitor asks its crawler for.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Content kind of the source.
    pub kind: ContentKind,
    /// Source name, as configured on the monitor.
    pub name: String,
    /// Organisation code owning the source.
    pub org_code: String,
    /// Site scoping list; empty means all configured sites.
    pub sites: Vec<String>,
    /// Optional cap on the number of teasers returned.
    pub max_results: Option<usize>,
    /// Optional keyword pattern the crawler may pre-filter on.
    pub keyword: Option<String>,
}

impl FetchRequest {
    /// Builds the request for one monitor's configured source.
    #[must_use]
    pub fn for_monitor(monitor: &Monitor) -> Self {
        Self {
            kind: monitor.kind,
            name: monitor.name.clone(),
            org_code: monitor.org_code.clone(),
            sites: monitor.sites.clone(),
            max_results: monitor.max_results,
            keyword: monitor.keyword.clone(),
        }
    }
}

/// Result of a successful fetch: the ordered teaser listing plus the crawled
/// page title, when the source exposes one.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Teasers in listing order.
    pub teasers: Vec<Teaser>,
    /// Title of the crawled page.
    pub page_title: Option<String>,
}

impl FetchOutcome {
    /// Wraps a teaser listing with no page title.
    #[must_use]
    pub fn new(teasers: Vec<Teaser>) -> Self {
        Self {
            teasers,
            page_title: None,
        }
    }
}

/// Cooperative cancellation signal passed to fetchers.
///
/// Fetchers should poll [`CancelToken::is_cancelled`] at suspension points
/// and bail out with [`FetchError::Cancelled`]. The token also carries the
/// check cycle's deadline; an expired deadline counts as cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Creates a token that only cancels on explicit request.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Creates a token that cancels after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left until the deadline, if one is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Errors raised by fetchers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch exceeded its deadline.
    #[error("Fetch timed out after {duration_ms}ms")]
    Timeout {
        /// Elapsed time when the deadline fired.
        duration_ms: u64,
    },

    /// Network-level failure (DNS, connect, TLS, transfer).
    #[error("Network error: {message}")]
    Network {
        /// Underlying failure description.
        message: String,
    },

    /// The listing was fetched but could not be parsed.
    #[error("Listing could not be parsed: {message}")]
    Parse {
        /// What failed during extraction.
        message: String,
    },

    /// The source refused the request.
    #[error("Access denied by source: {message}")]
    AccessDenied {
        /// Refusal details (status code, captcha, robots).
        message: String,
    },

    /// No page/channel configuration matches the monitor's source name.
    ///
    /// Unlike the transient errors, this cannot succeed on retry.
    #[error("No source configuration matches '{name}'")]
    SourceMissing {
        /// The unmatched source name.
        name: String,
    },

    /// The fetch observed its cancellation token and bailed out.
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if a retry could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::SourceMissing { .. })
    }
}

/// The crawler contract consumed by the check cycle.
pub trait Fetcher: Send + Sync {
    /// Fetches the current teaser listing for a source.
    ///
    /// # Errors
    /// Returns a [`FetchError`] when the listing cannot be produced. The
    /// fetcher must observe `cancel` at suspension points.
    fn fetch(&self, request: &FetchRequest, cancel: &CancelToken)
        -> Result<FetchOutcome, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cancels_on_request() {
        let token = CancelToken::unbounded();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn token_cancels_after_deadline() {
        let token = CancelToken::with_timeout(Duration::from_millis(0));
        assert!(token.is_cancelled());
    }

    #[test]
    fn token_clones_share_the_flag() {
        let token = CancelToken::unbounded();
        let seen_by_fetcher = token.clone();
        token.cancel();
        assert!(seen_by_fetcher.is_cancelled());
    }

    #[test]
    fn remaining_shrinks_toward_zero() {
        let token = CancelToken::with_timeout(Duration::from_secs(60));
        let remaining = token.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(CancelToken::unbounded().remaining().is_none());
    }

    #[test]
    fn only_source_missing_is_terminal() {
        assert!(FetchError::Timeout { duration_ms: 10 }.is_retryable());
        assert!(FetchError::Network { message: "reset".into() }.is_retryable());
        assert!(FetchError::Parse { message: "bad html".into() }.is_retryable());
        assert!(FetchError::AccessDenied { message: "403".into() }.is_retryable());
        assert!(FetchError::Cancelled.is_retryable());
        assert!(!FetchError::SourceMissing { name: "x".into() }.is_retryable());
    }
}
