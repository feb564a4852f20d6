//! Error taxonomy for the resolver
//!
//! Every fallible operation in the crate returns [`ResolverError`]. The HTTP
//! front-end maps variants onto status codes through [`ResolverError::http_status`].

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("tag '{tag}' is invalid according to stored patterns")]
    InvalidTag { tag: String },

    #[error("tag '{tag}' is ambiguous to stored patterns: {}", .candidates.join(", "))]
    AmbiguousTag { tag: String, candidates: Vec<String> },

    #[error("invalid grammar: {0}")]
    InvalidGrammar(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("discovery failed for {url}: {reason}")]
    Discovery { url: String, reason: String },

    #[error("invalid registry record '{record}': {reason}")]
    Validation { record: String, reason: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("request to {url} failed: {failure}")]
    Request { url: String, failure: RequestFailure },

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("no provider serves term '{0}'")]
    UnknownTerm(String),

    #[error("term '{term}' is not served at {url}")]
    TermUnavailable { term: String, url: String },

    #[error("service '{0}' declares no data endpoint")]
    NoDataEndpoint(String),

    #[error("cannot select an identifier for key '{key}' from tag '{tag}'")]
    UnresolvableIdentifier { tag: String, key: String },

    #[error("service catalogue unavailable: no refresh has succeeded yet")]
    CatalogueUnavailable,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Why an outbound provider request failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    Transport(String),
    Timeout,
    Status(u16),
    Decode(String),
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(cause) => write!(f, "transport error: {}", cause),
            Self::Timeout => write!(f, "timed out"),
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::Decode(cause) => write!(f, "undecodable response: {}", cause),
        }
    }
}

impl RequestFailure {
    /// Classify a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Transport failures and timeouts are worth another attempt; status codes
    /// and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl ResolverError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidTag { .. } => 400,
            Self::AmbiguousTag { .. } => 422,
            Self::InvalidGrammar(_) => 400,
            Self::UnresolvableIdentifier { .. } => 400,
            Self::UnknownTerm(_) => 404,
            Self::TermUnavailable { .. } => 404,
            Self::Storage(_) => 500,
            Self::Config(_) => 500,
            Self::Discovery { .. } | Self::Validation { .. } | Self::Schema(_) => 502,
            Self::Request { .. } | Self::UnsupportedMethod(_) | Self::NoDataEndpoint(_) => 502,
            Self::CatalogueUnavailable => 503,
        }
    }

    pub(crate) fn discovery(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Discovery {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn request(url: impl Into<String>, failure: RequestFailure) -> Self {
        Self::Request {
            url: url.into(),
            failure,
        }
    }

    /// True for request failures a caller may retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { failure, .. } => failure.is_transient(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for ResolverError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for ResolverError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
