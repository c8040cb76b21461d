//! Error types / 错误类型
//!
//! Every remote call classifies its failure here: transport problems, HTTP
//! statuses (transient or fatal), protocol surprises and caller mistakes.

use std::fmt;
use thiserror::Error;

use crate::storage::Mode;

pub type Result<T> = std::result::Result<T, GcsError>;

/// Retry classification of an HTTP failure / HTTP失败的重试分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Worth retrying (overload, timeout) / 可重试
    Transient,
    /// Retrying cannot help / 重试无效
    Fatal,
    /// Status without a known classification / 未分类状态码
    Other,
}

/// Known HTTP failure kinds / 已知的HTTP错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    RequestTimeout,
    TooManyRequests,
    InternalServer,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidRange,
    Other,
}

impl HttpErrorKind {
    pub fn from_status(code: u16) -> Self {
        match code {
            408 => Self::RequestTimeout,
            429 => Self::TooManyRequests,
            500 => Self::InternalServer,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            504 => Self::GatewayTimeout,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            416 => Self::InvalidRange,
            _ => Self::Other,
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            Self::RequestTimeout
            | Self::TooManyRequests
            | Self::InternalServer
            | Self::BadGateway
            | Self::ServiceUnavailable
            | Self::GatewayTimeout => ErrorCategory::Transient,
            Self::BadRequest
            | Self::Unauthorized
            | Self::Forbidden
            | Self::NotFound
            | Self::InvalidRange => ErrorCategory::Fatal,
            Self::Other => ErrorCategory::Other,
        }
    }
}

/// HTTP status failure returned by GCS / GCS返回的HTTP错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub code: u16,
    pub kind: HttpErrorKind,
    pub message: String,
}

impl HttpError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: HttpErrorKind::from_status(code),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP Error {}", self.code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {}

#[derive(Debug, Error)]
pub enum GcsError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("unexpected status {status} while {step}")]
    Protocol { step: &'static str, status: u16 },

    #[error("file open for {mode}, cannot {action}")]
    WrongMode { mode: Mode, action: &'static str },

    #[error("file is closed")]
    Closed,

    #[error("only r or w modes supported, got {0:?}")]
    InvalidMode(String),

    #[error("chunk size must be a positive multiple of {multiple}, got {size}")]
    InvalidChunkSize { size: usize, multiple: usize },

    #[error("{operation} needs {attribute} to be set")]
    Incomplete {
        operation: &'static str,
        attribute: &'static str,
    },

    #[error("bad data returned by GCS: {0}")]
    BadResponse(String),

    #[error("'{resource}' object has no attribute '{name}'")]
    NoSuchAttribute { resource: &'static str, name: String },

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GcsError {
    /// HTTP status code, if this is a classified HTTP failure / HTTP状态码
    pub fn http_code(&self) -> Option<u16> {
        match self {
            GcsError::Http(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GcsError::Http(e) => e.category(),
            _ => ErrorCategory::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GcsError::Http(e) if e.kind == HttpErrorKind::NotFound)
    }
}

impl From<reqwest::Error> for GcsError {
    fn from(e: reqwest::Error) -> Self {
        GcsError::Transport(e.to_string())
    }
}

impl From<GcsError> for std::io::Error {
    fn from(e: GcsError) -> Self {
        use std::io::ErrorKind;

        let kind = match &e {
            GcsError::Io(inner) => inner.kind(),
            GcsError::Http(h) if h.kind == HttpErrorKind::NotFound => ErrorKind::NotFound,
            GcsError::Http(h) if h.kind == HttpErrorKind::Forbidden
                || h.kind == HttpErrorKind::Unauthorized => ErrorKind::PermissionDenied,
            GcsError::WrongMode { .. } | GcsError::Closed | GcsError::InvalidMode(_)
            | GcsError::InvalidChunkSize { .. } => ErrorKind::InvalidInput,
            GcsError::BadResponse(_) | GcsError::Json(_) => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert_eq!(HttpErrorKind::from_status(code).category(), ErrorCategory::Transient, "{}", code);
        }
        for code in [400, 401, 403, 404, 416] {
            assert_eq!(HttpErrorKind::from_status(code).category(), ErrorCategory::Fatal, "{}", code);
        }
        assert_eq!(HttpErrorKind::from_status(418), HttpErrorKind::Other);
        assert_eq!(HttpErrorKind::from_status(418).category(), ErrorCategory::Other);
    }

    #[test]
    fn test_http_error_display() {
        assert_eq!(HttpError::new(404, "").to_string(), "HTTP Error 404");
        assert_eq!(HttpError::new(503, "busy").to_string(), "HTTP Error 503: busy");
    }

    #[test]
    fn test_not_found_detection() {
        let err: GcsError = HttpError::new(404, "gone").into();
        assert!(err.is_not_found());
        assert_eq!(err.http_code(), Some(404));
        assert!(!GcsError::Closed.is_not_found());
        assert_eq!(GcsError::Closed.http_code(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io: std::io::Error = GcsError::from(HttpError::new(404, "")).into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);

        let io: std::io::Error = GcsError::Closed.into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);
    }
}
