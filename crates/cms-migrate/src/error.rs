//! Error types for cms-migrate.
//!
//! Every variant carries a stable code (`MIG-XXX`) so operators can grep a
//! report or a log line for a specific failure class.

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating a collection.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration (MIG-001).
    #[error("[MIG-001] Configuration error: {0}")]
    Config(String),

    /// Credentials rejected by a remote API (MIG-002).
    #[error("[MIG-002] Authentication failed: {0}")]
    Authentication(String),

    /// Remote API asked us to slow down (MIG-003).
    #[error("[MIG-003] Rate limited (HTTP 429){}", retry_after_suffix(.retry_after))]
    RateLimit {
        /// Seconds advertised by the `Retry-After` header, if any.
        retry_after: Option<u64>,
    },

    /// Non-success HTTP status other than 401/403/429 (MIG-004).
    #[error("[MIG-004] HTTP {status} from {url}: {body}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Truncated response body.
        body: String,
    },

    /// Request exceeded its deadline (MIG-005).
    #[error("[MIG-005] Request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure: refused, reset, DNS (MIG-006).
    #[error("[MIG-006] Network error: {0}")]
    Network(String),

    /// Source enumeration could not complete; the run is aborted (MIG-007).
    #[error("[MIG-007] Enumeration of '{collection}' failed at offset {offset}: {source}")]
    Enumeration {
        /// Source collection id.
        collection: String,
        /// Offset of the page that failed.
        offset: usize,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Malformed payload from the source (MIG-008).
    #[error("[MIG-008] Extraction error: {0}")]
    Extraction(String),

    /// Asset exceeds the configured byte ceiling (MIG-009).
    #[error("[MIG-009] Asset too large: limit {limit} bytes")]
    TooLarge {
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// Asset is not an image (MIG-010).
    #[error("[MIG-010] Unexpected content type: {0}")]
    InvalidContentType(String),

    /// Redirect chain longer than the hop guard (MIG-011).
    #[error("[MIG-011] Too many redirects (max {0})")]
    TooManyRedirects(usize),

    /// Image decode/encode failure (MIG-012).
    #[error("[MIG-012] Transcode error: {0}")]
    Transcode(String),

    /// Object storage write failure (MIG-013).
    #[error("[MIG-013] Storage error: {0}")]
    Storage(String),

    /// Destination API rejected a write (MIG-014).
    #[error("[MIG-014] Destination error: {0}")]
    Destination(String),

    /// Destination already holds a record with this slug (MIG-015).
    #[error("[MIG-015] Record already exists: {0}")]
    Conflict(String),

    /// IO error (MIG-016).
    #[error("[MIG-016] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (MIG-017).
    #[error("[MIG-017] Serialization error: {0}")]
    Serialization(String),
}

fn retry_after_suffix(retry_after: &Option<u64>) -> String {
    retry_after.map_or_else(String::new, |s| format!(", retry after {s}s"))
}

impl Error {
    /// Returns the error code (e.g., "MIG-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "MIG-001",
            Self::Authentication(_) => "MIG-002",
            Self::RateLimit { .. } => "MIG-003",
            Self::HttpStatus { .. } => "MIG-004",
            Self::Timeout(_) => "MIG-005",
            Self::Network(_) => "MIG-006",
            Self::Enumeration { .. } => "MIG-007",
            Self::Extraction(_) => "MIG-008",
            Self::TooLarge { .. } => "MIG-009",
            Self::InvalidContentType(_) => "MIG-010",
            Self::TooManyRedirects(_) => "MIG-011",
            Self::Transcode(_) => "MIG-012",
            Self::Storage(_) => "MIG-013",
            Self::Destination(_) => "MIG-014",
            Self::Conflict(_) => "MIG-015",
            Self::Io(_) => "MIG-016",
            Self::Serialization(_) => "MIG-017",
        }
    }

    /// Returns true if this error must terminate the whole run.
    ///
    /// Everything else is folded into the ledger for the affected item. A
    /// fatal error hit while writing an item stops the run after the
    /// current batch.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Authentication(_) | Self::Enumeration { .. }
        )
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
                body: String::new(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
