//! Error types for the networking crate.

use std::fmt;

use horizon_compose_core::TransportError;

/// Network-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// HTTP request failed.
    Request(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Request timed out.
    Timeout,
    /// Connection refused or failed.
    Connection(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// The response body is not valid JSON.
    Json(String),
    /// HTTP error status (4xx or 5xx).
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Optional error message from the response body.
        message: Option<String>,
    },
    /// Redirect limit exceeded.
    TooManyRedirects,
    /// A response interceptor rejected the response.
    Rejected(String),
}

impl NetworkError {
    /// The HTTP status, for status errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "HTTP request error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::HttpStatus { status, message } => {
                if let Some(msg) = message {
                    write!(f, "HTTP {status}: {msg}")
                } else {
                    write!(f, "HTTP {status}")
                }
            }
            Self::TooManyRedirects => write!(f, "Too many redirects"),
            Self::Rejected(msg) => write!(f, "Response rejected: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<NetworkError> for TransportError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::HttpStatus { status, message } => Self::HttpStatus { status, message },
            NetworkError::Timeout => Self::Timeout,
            NetworkError::Connection(msg) => Self::Connection(msg),
            NetworkError::InvalidUrl(msg) => Self::InvalidUrl(msg),
            NetworkError::Json(msg) => Self::Decode(msg),
            other => Self::Request(other.to_string()),
        }
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = NetworkError::HttpStatus {
            status: 422,
            message: Some("Invalid name".into()),
        };
        assert_eq!(err.to_string(), "HTTP 422: Invalid name");
        assert_eq!(err.status(), Some(422));
        assert_eq!(NetworkError::Timeout.status(), None);
    }

    #[test]
    fn test_into_transport_error() {
        let err: TransportError = NetworkError::HttpStatus {
            status: 404,
            message: None,
        }
        .into();
        assert_eq!(err.status(), Some(404));

        let err: TransportError = NetworkError::Json("eof".into()).into();
        assert_eq!(err, TransportError::Decode("eof".into()));

        let err: TransportError = NetworkError::TooManyRedirects.into();
        assert_eq!(err, TransportError::Request("Too many redirects".into()));
    }
}
