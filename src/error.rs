//! Error types for frame transport and processing.
//!
//! All errors implement `std::error::Error` and carry enough context to be
//! reported against a `frame_id` or a connection.
//!
//! ## Error Categories
//!
//! - **Per-frame errors**: `Encode`, `Decode`, `Parse`, `Transform`, `Sink`.
//!   These are contained to one frame's result and never abort a batch.
//! - **Session errors**: `Connection`. Fatal to the producer loop or to the
//!   current ingestion session, never retried automatically.
//! - **Startup errors**: `File`, `Config`. Fatal before any loop starts.
//! - **Task errors**: `Task`. A background task panicked or was aborted.
//!
//! ```rust
//! use framecast::{ConnectionErrorKind, StreamError};
//!
//! let io = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
//! let error = StreamError::connection("write frame", io);
//! assert!(error.is_fatal());
//! assert_eq!(error.connection_kind(), Some(ConnectionErrorKind::PeerReset));
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for framecast operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Classification of transport-level failures.
///
/// Derived from [`io::ErrorKind`] only, never from message text or raw OS codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The peer reset or aborted the connection, or the pipe broke mid-write.
    PeerReset,
    /// The stream was closed, either cleanly or with a truncated read.
    Closed,
    /// Anything else (refused, unreachable, timed out, ...).
    Other,
}

impl ConnectionErrorKind {
    /// Classify an I/O error.
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ConnectionErrorKind::PeerReset,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::NotConnected => {
                ConnectionErrorKind::Closed
            }
            _ => ConnectionErrorKind::Other,
        }
    }

    /// Whether this kind ends a session the normal way (peer went away).
    pub fn is_disconnect(self) -> bool {
        matches!(self, ConnectionErrorKind::PeerReset | ConnectionErrorKind::Closed)
    }
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionErrorKind::PeerReset => "peer reset",
            ConnectionErrorKind::Closed => "closed",
            ConnectionErrorKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// A wire line that could not be turned into a [`WireMessage`](crate::WireMessage).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("malformed wire line: {reason}")]
pub struct ParseFailure {
    /// The offending line, without its delimiter.
    pub raw_line: String,
    /// Human readable parse error.
    pub reason: String,
    /// Frame id, when it could still be recovered from the line.
    pub frame_id: Option<u64>,
}

impl ParseFailure {
    /// Create a failure for `raw_line`.
    pub fn new(raw_line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { raw_line: raw_line.into(), reason: reason.into(), frame_id: None }
    }

    /// Attach a recovered frame id.
    pub fn with_frame_id(mut self, frame_id: Option<u64>) -> Self {
        self.frame_id = frame_id;
        self
    }
}

/// Main error type for framecast operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Failed to encode frame: {details}")]
    Encode { details: String },

    #[error("Failed to decode {context}: {details}")]
    Decode { context: String, details: String },

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("Connection error ({kind}) during {reason}")]
    Connection {
        kind: ConnectionErrorKind,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("Transform failed: {details}")]
    Transform { details: String },

    #[error("Failed to write output to {location}")]
    Sink {
        location: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Background task failed: {details}")]
    Task { details: String },
}

impl StreamError {
    /// Returns whether this error ends the owning loop or process.
    ///
    /// Per-frame errors are never fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            StreamError::Connection { .. } => true,
            StreamError::File { .. } => true,
            StreamError::Config { .. } => true,
            StreamError::Task { .. } => true,
            StreamError::Encode { .. } => false,
            StreamError::Decode { .. } => false,
            StreamError::Parse(_) => false,
            StreamError::Transform { .. } => false,
            StreamError::Sink { .. } => false,
        }
    }

    /// Connection classification, if this is a connection error.
    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match self {
            StreamError::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::Encode { .. } => vec![
                "Check the frame buffer matches width x height x 3",
                "Check frame dimensions are non-zero and below 65536",
            ],
            StreamError::Decode { .. } => vec![
                "Verify the producer sends base64-encoded JPEG payloads",
                "Check for truncated or corrupted lines on the wire",
            ],
            StreamError::Parse(_) => vec![
                "Verify each line is a single JSON object",
                "Check the producer terminates every message with a newline",
            ],
            StreamError::Connection { .. } => vec![
                "Restart the producer, then the consumer",
                "Check host and port match on both sides",
                "Check nothing else is bound to the port",
            ],
            StreamError::Transform { .. } => vec![
                "Check the segmentation model matches the frame format",
                "Inspect the transform logs for the failing frame",
            ],
            StreamError::Sink { .. } => vec![
                "Check the output directory exists and is writable",
                "Ensure sufficient disk space",
            ],
            StreamError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            StreamError::Config { .. } => vec![
                "Check configuration values against the documented ranges",
                "Remove the offending key to fall back to its default",
            ],
            StreamError::Task { .. } => vec!["Check the logs for a panic in the failing task"],
        }
    }

    /// Helper constructor for encode errors.
    pub fn encode(details: impl Into<String>) -> Self {
        StreamError::Encode { details: details.into() }
    }

    /// Helper constructor for decode errors.
    pub fn decode(context: impl Into<String>, details: impl ToString) -> Self {
        StreamError::Decode { context: context.into(), details: details.to_string() }
    }

    /// Helper constructor for connection errors classified from an I/O error.
    pub fn connection(reason: impl Into<String>, source: io::Error) -> Self {
        StreamError::Connection {
            kind: ConnectionErrorKind::classify(&source),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for a connection that closed without an I/O error.
    pub fn connection_closed(reason: impl Into<String>) -> Self {
        StreamError::Connection {
            kind: ConnectionErrorKind::Closed,
            reason: reason.into(),
            source: None,
        }
    }

    /// Helper constructor for transform errors.
    pub fn transform(details: impl Into<String>) -> Self {
        StreamError::Transform { details: details.into() }
    }

    /// Helper constructor for sink errors.
    pub fn sink(
        location: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StreamError::Sink { location: location.into(), source: Some(source.into()) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StreamError::File { path: path.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        StreamError::Config { details: details.into() }
    }

    /// Helper constructor for a background task that panicked or was aborted.
    pub fn task(details: impl ToString) -> Self {
        StreamError::Task { details: details.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            details in "\\w+",
            context in "\\w+",
            reason in "\\w+"
          ) {
            let encode = StreamError::encode(details.clone());
            let decode = StreamError::decode(context.clone(), details.clone());
            let parse: StreamError = ParseFailure::new("{", reason.clone()).into();
            let config = StreamError::config(details.clone());

            prop_assert!(encode.to_string().contains(&details));
            prop_assert!(decode.to_string().contains(&context));
            prop_assert!(decode.to_string().contains(&details));
            prop_assert!(parse.to_string().contains(&reason));
            prop_assert!(config.to_string().contains(&details));
          }
        }
    }

    #[test]
    fn io_errors_are_classified_by_kind() {
        let cases = [
            (io::ErrorKind::ConnectionReset, ConnectionErrorKind::PeerReset),
            (io::ErrorKind::ConnectionAborted, ConnectionErrorKind::PeerReset),
            (io::ErrorKind::BrokenPipe, ConnectionErrorKind::PeerReset),
            (io::ErrorKind::UnexpectedEof, ConnectionErrorKind::Closed),
            (io::ErrorKind::ConnectionRefused, ConnectionErrorKind::Other),
            (io::ErrorKind::TimedOut, ConnectionErrorKind::Other),
        ];

        for (kind, expected) in cases {
            assert_eq!(ConnectionErrorKind::classify(&io::Error::from(kind)), expected);
        }
        assert!(ConnectionErrorKind::PeerReset.is_disconnect());
        assert!(!ConnectionErrorKind::Other.is_disconnect());
    }

    #[test]
    fn per_frame_errors_are_not_fatal() {
        assert!(!StreamError::encode("x").is_fatal());
        assert!(!StreamError::decode("payload", "x").is_fatal());
        assert!(!StreamError::transform("x").is_fatal());
        assert!(!StreamError::sink("out", "disk full").is_fatal());
        assert!(!StreamError::from(ParseFailure::new("", "empty")).is_fatal());

        assert!(StreamError::connection_closed("read").is_fatal());
        assert!(StreamError::config("port").is_fatal());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();

        let error = StreamError::connection_closed("test");
        let _: &dyn std::error::Error = &error;
        assert!(!error.recovery_suggestions().is_empty());
    }

    #[test]
    fn connection_source_is_preserved() {
        let io = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let error = StreamError::connection("write frame", io);

        let source = std::error::Error::source(&error).expect("source should be kept");
        assert_eq!(source.to_string(), "reset by peer");
        assert_eq!(error.connection_kind(), Some(ConnectionErrorKind::PeerReset));
    }
}
