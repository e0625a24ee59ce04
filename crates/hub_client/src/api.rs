//! The capability set the reconciliation engine depends on.

use std::fmt;

use leadsync_core::Lead;

/// Result of a lookup by email.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Lead),
    NotFound,
}

/// Lookup / create / update against the system of record.
///
/// Implementations carry no per-call mutable state, so one instance may be
/// shared across threads for a whole batch.
pub trait LeadApi: Send + Sync {
    fn lookup(&self, email: &str) -> Result<Lookup, ApiError>;
    fn create(&self, lead: &Lead) -> Result<Lead, ApiError>;
    fn update(&self, lead: &Lead) -> Result<Lead, ApiError>;
}

impl<T: LeadApi + ?Sized> LeadApi for &T {
    fn lookup(&self, email: &str) -> Result<Lookup, ApiError> {
        (**self).lookup(email)
    }

    fn create(&self, lead: &Lead) -> Result<Lead, ApiError> {
        (**self).create(lead)
    }

    fn update(&self, lead: &Lead) -> Result<Lead, ApiError> {
        (**self).update(lead)
    }
}

impl<T: LeadApi + ?Sized> LeadApi for Box<T> {
    fn lookup(&self, email: &str) -> Result<Lookup, ApiError> {
        (**self).lookup(email)
    }

    fn create(&self, lead: &Lead) -> Result<Lead, ApiError> {
        (**self).create(lead)
    }

    fn update(&self, lead: &Lead) -> Result<Lead, ApiError> {
        (**self).update(lead)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Connect,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timeout"),
            Self::Connect => write!(f, "connection failed"),
            Self::Other => write!(f, "request failed"),
        }
    }
}

/// Error type for remote operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Timeout, refused connection, DNS failure. Never retried.
    #[error("{kind}: {cause}")]
    Network { kind: NetworkErrorKind, cause: String },

    /// Non-2xx response other than 429.
    #[error("API returned status {status}{}", body_suffix(.body))]
    UnexpectedStatus { status: u16, body: String },

    /// Still rate limited after the retry budget was spent.
    #[error("rate limited: gave up after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// 2xx response whose body does not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A backoff wait was interrupted by cancellation.
    #[error("cancelled while waiting to retry")]
    Cancelled,

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Setup(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::RateLimitExhausted { .. } => Some(429),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}
