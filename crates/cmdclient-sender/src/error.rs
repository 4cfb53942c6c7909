use std::time::Duration;

use cmdclient_frame::{FieldKind, FrameError};

/// Errors that can occur while sending a command.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The command could not be encoded; nothing was written.
    #[error("command rejected: {0}")]
    Frame(#[from] FrameError),

    /// The sink failed while a field was being written or flushed.
    #[error("failed writing {} field: {source}", .field.name())]
    Io {
        field: FieldKind,
        source: std::io::Error,
    },

    /// The sink accepted zero bytes for a non-empty field.
    #[error("connection closed while writing {} field", .field.name())]
    ConnectionClosed { field: FieldKind },

    /// The permit was not acquired within the configured timeout.
    #[error("timed out after {0:?} waiting for the send permit")]
    Timeout(Duration),

    /// The sender was closed; no further commands are accepted.
    #[cfg(feature = "async")]
    #[error("sender closed")]
    Closed,
}

impl SendError {
    /// The field being written when the sink failed, if any.
    ///
    /// Bytes of earlier fields may already have reached the sink.
    pub fn field(&self) -> Option<FieldKind> {
        match self {
            SendError::Io { field, .. } | SendError::ConnectionClosed { field } => Some(*field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SendError>;
