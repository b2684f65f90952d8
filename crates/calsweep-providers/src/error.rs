//! Store errors.
//!
//! Every failure a [`CalendarStore`](crate::CalendarStore) reports is a
//! [`ProviderError`]. The [`ProviderErrorCode`] says what kind of failure it
//! was, and the optional [`StoreOperation`] says which call hit it, so a bulk
//! run can report "delete failed: not found" rather than a bare HTTP status.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Missing, expired or revoked credentials (401).
    AuthenticationFailed,
    /// The account cannot read or write this calendar (403).
    AuthorizationFailed,
    /// The request never got an HTTP answer.
    NetworkError,
    /// Quota exhausted (429).
    RateLimited,
    /// 5xx from the calendar service.
    ServerError,
    /// A body that does not deserialize, or an event without usable times.
    InvalidResponse,
    /// Event or calendar gone (404/410).
    NotFound,
    /// Rejected request (400), including stale page tokens.
    BadRequest,
    ConfigurationError,
    InternalError,
}

impl ProviderErrorCode {
    /// Whether the same call could succeed if issued again later.
    ///
    /// Nothing in calsweep retries; the client only uses this to tell the
    /// user a rerun is worth trying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The store call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    List,
    Update,
    Delete,
    Insert,
    Auth,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Insert => "insert",
            Self::Auth => "auth",
        }
    }
}

/// A failed store call.
///
/// Displays as `[operation] code: message`, the operation part only when
/// the error was tagged with [`ProviderError::during`].
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    operation: Option<StoreOperation>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            operation: None,
            source: None,
        }
    }

    // Shorthands, one per code.

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Tags the error with the store call it came from.
    pub fn during(self, operation: StoreOperation) -> Self {
        Self {
            operation: Some(operation),
            ..self
        }
    }

    pub fn with_source<E>(self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Some(Box::new(source)),
            ..self
        }
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> Option<StoreOperation> {
        self.operation
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Some(op) => write!(f, "[{}] {}: {}", op.as_str(), self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
