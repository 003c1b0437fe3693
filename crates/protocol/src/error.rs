//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is shorter than the fixed layout of the message being decoded
    #[error("Truncated {message}: needed {needed} bytes, got {available}")]
    Truncated {
        message: &'static str,
        needed: usize,
        available: usize,
    },

    /// Peer closed the stream (zero-length read)
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// I/O error during frame operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True when the error means the peer went away rather than sent garbage
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            Self::Truncated { .. } => false,
        }
    }
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
