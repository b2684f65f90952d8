//! Client error types.

use std::fmt;

use calsweep_core::{RuleError, TimeError};
use calsweep_providers::ProviderError;
use thiserror::Error;

use crate::runner::{RunError, RunFailure};
use crate::secret::SecretError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
///
/// Everything except [`ClientError::Run`] and [`ClientError::Provider`] is
/// raised before the calendar is touched.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A color or delete rule does not compile.
    #[error("configuration error: {0}")]
    Rules(#[from] RuleError),

    /// A window bound or `--copy-to` date is invalid.
    #[error("invalid date: {0}")]
    Time(#[from] TimeError),

    /// A secret reference could not be resolved.
    #[error("failed to resolve {field}: {source}")]
    Secret {
        field: &'static str,
        #[source]
        source: SecretError,
    },

    /// Provider error outside of a bulk run.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication required.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// A bulk run stopped on its first failure.
    #[error("run aborted ({progress}): {source}")]
    Run {
        progress: String,
        #[source]
        source: RunFailure,
    },
}

impl<S: fmt::Display> From<RunError<S>> for ClientError {
    fn from(err: RunError<S>) -> Self {
        Self::Run {
            progress: err.partial.to_string(),
            source: err.cause,
        }
    }
}

impl ClientError {
    /// True when the calendar service reported a failure worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(e)
            | Self::Run {
                source: RunFailure::Store(e),
                ..
            } => e.is_transient(),
            _ => false,
        }
    }
}
