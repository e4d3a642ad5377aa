//! Error types for the wsp CLI application.
//!
//! Library errors are categorised here so the top level can print them
//! consistently and decide on hints.

use std::error::Error;
use std::fmt;

use wsp_ingress::IngressError;

/// Primary error type for the wsp CLI application.
#[derive(Debug)]
pub enum WspError {
    /// Configuration-related errors
    Config {
        source: Box<dyn std::error::Error + Send + Sync>,
        context: String,
    },

    /// Failures talking to or managing the ingress
    Ingress {
        source: IngressError,
        /// The operation that failed
        operation: String,
    },

    /// Validation errors for user input
    Validation {
        message: String,
        /// The field or input that failed validation
        field: Option<String>,
    },
}

impl fmt::Display for WspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WspError::Config { context, .. } => {
                write!(f, "Configuration error: {context}: {}", self.source_message())
            }
            WspError::Ingress { source, operation } => {
                write!(f, "Ingress {operation} failed: {source}")
            }
            WspError::Validation { message, field } => match field {
                Some(field_name) => write!(f, "Validation error for '{field_name}': {message}"),
                None => write!(f, "Validation error: {message}"),
            },
        }
    }
}

impl std::error::Error for WspError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WspError::Config { source, .. } => Some(source.as_ref()),
            WspError::Ingress { source, .. } => Some(source),
            WspError::Validation { .. } => None,
        }
    }
}

impl WspError {
    fn source_message(&self) -> String {
        match self.source() {
            Some(source) => source.to_string(),
            None => "Unknown error".to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: Option<impl Into<String>>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(|s| s.into()),
        }
    }

    /// Wrap an ingress error with the operation it came from.
    ///
    /// Input errors become validation errors naming the offending field.
    pub fn ingress(source: IngressError, operation: impl Into<String>) -> Self {
        match source {
            IngressError::InvalidHostname { hostname, reason } => {
                Self::validation(format!("'{hostname}' {reason}"), Some("hostname"))
            }
            IngressError::InvalidUpstream { upstream, reason } => {
                Self::validation(format!("'{upstream}' {reason}"), Some("upstream"))
            }
            IngressError::InvalidWorkspace { name, reason } => {
                Self::validation(format!("'{name}' {reason}"), Some("workspace"))
            }
            IngressError::RouteOwned { hostname, owner } => Self::validation(
                format!("'{hostname}' is already registered by workspace '{owner}'"),
                Some("hostname"),
            ),
            IngressError::Config(msg) => Self::Config {
                source: Box::new(std::io::Error::other(msg)),
                context: operation.into(),
            },
            source => Self::Ingress {
                source,
                operation: operation.into(),
            },
        }
    }

    /// True when the control API could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, WspError::Ingress { source, .. } if source.is_unreachable())
    }
}

/// Convenience type alias for Results using WspError
pub type WspResult<T> = Result<T, WspError>;
