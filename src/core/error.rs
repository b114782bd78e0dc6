use std::io;
use thiserror::Error;

/// Custom error types for HECP
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("device not connected")]
    NotConnected,
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new connect error
    pub fn connect(msg: impl Into<String>) -> Self {
        Error::Connect(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::protocol("bad frame");
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(err.to_string(), "protocol error: bad frame");

        let err = Error::validation("out of range");
        assert_eq!(err.to_string(), "validation error: out of range");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_unknown_parameter_display() {
        let err = Error::UnknownParameter("sharpness".into());
        assert_eq!(err.to_string(), "unknown parameter: sharpness");
    }
}
