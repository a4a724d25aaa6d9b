//! Error types for eye-tracking server communication
//!
//! This module defines all error types that can occur while talking to the
//! tracking server, including network I/O, JSON framing, request
//! correlation, and calibration state validation.

use thiserror::Error;

/// Gaze client error types
///
/// Internal operations return `Result<T, GazeError>`. The public
/// [`GazeClient`](crate::session::GazeClient) surface converts these into
/// `bool`/`Option` results at its boundary and logs the cause.
#[derive(Error, Debug)]
pub enum GazeError {
    /// I/O error occurred during network communication
    ///
    /// This error wraps standard library I/O errors and occurs when:
    /// - TCP connection was refused (server not running)
    /// - Connection lost during transmission (broken pipe)
    /// - Socket was closed by peer
    ///
    /// # Example
    /// ```no_run
    /// # use gazelink::error::GazeError;
    /// # use std::io;
    /// let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused");
    /// let err = GazeError::Io(io_err);
    /// ```
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be encoded or decoded as JSON
    ///
    /// Inbound parse failures are logged and counted by the transport rather
    /// than surfaced; this variant reaches callers only when a typed payload
    /// inside an otherwise valid response has the wrong shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The TCP connect did not complete within the allotted window
    #[error("Connection to {addr} timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// Target address
        addr: String,
        /// Connect timeout in milliseconds
        timeout_ms: u128,
    },

    /// An operation needed an open connection and there was none
    #[error("Not connected to tracker server")]
    NotConnected,

    /// No response arrived before the request deadline
    #[error("Request timed out after {0} ms")]
    Timeout(u128),

    /// The request was dropped before a response arrived
    ///
    /// Every request still pending when the transport closes resolves with
    /// this error, so blocked callers wake up immediately.
    #[error("Request cancelled")]
    Cancelled,

    /// The server answered with a non-200 status code
    ///
    /// # Example
    /// ```no_run
    /// # use gazelink::error::GazeError;
    /// let err = GazeError::Status {
    ///     code: 403,
    ///     message: "Calibration not started".to_string(),
    /// };
    /// ```
    #[error("Server returned status {code}: {message}")]
    Status {
        /// Status code from the response line
        code: u16,
        /// `statusmessage` from the response values, if any
        message: String,
    },

    /// Writing a request failed on every attempt
    #[error("Write failed after {attempts} attempts")]
    WriteFailed {
        /// Number of write attempts made
        attempts: u32,
    },

    /// The operation is not valid in the current session state
    ///
    /// Raised without contacting the server, e.g. starting a calibration
    /// while one is already sampling.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The worker pool could not be started or has been shut down
    #[error("Worker pool unavailable: {0}")]
    Runtime(String),
}

/// Result type alias for gaze client operations
pub type Result<T> = std::result::Result<T, GazeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = GazeError::Status {
            code: 403,
            message: "not calibrating".to_string(),
        };
        assert_eq!(err.to_string(), "Server returned status 403: not calibrating");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: GazeError = io_err.into();
        assert!(matches!(err, GazeError::Io(_)));
    }
}
