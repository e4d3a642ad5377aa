//! Error type for the ingress route controller.

use thiserror::Error;
use wsp_core::WspError;

#[derive(Error, Debug)]
pub enum IngressError {
    /// The request never produced an HTTP response (connect failure, timeout).
    ///
    /// `retryable` is set when repeating the request cannot duplicate state on
    /// the proxy: always for GET/PUT/PATCH/DELETE, and for POST only when the
    /// connection was never established.
    #[error("{method} {path} failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
        retryable: bool,
    },

    #[error("{method} {path} returned HTTP {code}: {body}")]
    Status {
        method: String,
        path: String,
        code: u16,
        body: String,
    },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to {action} {target}: {source}")]
    Operation {
        action: String,
        target: String,
        #[source]
        source: Box<IngressError>,
    },

    #[error("invalid hostname '{hostname}': {reason}")]
    InvalidHostname { hostname: String, reason: String },

    #[error("invalid upstream '{upstream}': {reason}")]
    InvalidUpstream { upstream: String, reason: String },

    #[error("invalid workspace name '{name}': {reason}")]
    InvalidWorkspace { name: String, reason: String },

    #[error("hostname '{hostname}' is already registered by workspace '{owner}'")]
    RouteOwned { hostname: String, owner: String },

    #[error("ingress already has {routes} route(s) configured")]
    AlreadyInitialized { routes: usize },

    #[error("ingress container error: {0}")]
    Container(String),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IngressError>;

impl IngressError {
    /// Wrap an error with the operation and object it was raised for.
    pub fn during(self, action: impl Into<String>, target: impl Into<String>) -> Self {
        IngressError::Operation {
            action: action.into(),
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// True only for transport failures that are safe to repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngressError::Transport { retryable: true, .. })
    }

    /// The innermost error beneath any `Operation` wrappers.
    pub fn root(&self) -> &IngressError {
        match self {
            IngressError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status code, if the proxy answered with an error status.
    pub fn status_code(&self) -> Option<u16> {
        match self.root() {
            IngressError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the control API could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self.root(), IngressError::Transport { .. })
    }
}

/// Extract the human-readable reason from a core validation error.
pub(crate) fn validation_reason(err: WspError) -> String {
    match err {
        WspError::Validation(reason) => reason,
        other => other.to_string(),
    }
}

impl From<WspError> for IngressError {
    fn from(err: WspError) -> Self {
        match err {
            WspError::Io(e) => IngressError::Io(e),
            WspError::Config(s) => IngressError::Config(s),
            WspError::DockerNotRunning | WspError::Dependency(_) | WspError::Command(_) => {
                IngressError::Container(err.to_string())
            }
            other => IngressError::Config(other.to_string()),
        }
    }
}

impl From<serde_yaml_ng::Error> for IngressError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        IngressError::Config(err.to_string())
    }
}
