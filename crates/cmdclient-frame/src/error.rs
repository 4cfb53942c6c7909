use crate::codec::FieldKind;

/// Errors that can occur during command encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame carries a kind code outside the known command set.
    #[error("unknown command kind code {0}")]
    UnknownKind(u32),

    /// The address field does not hold a textual IPv4/IPv6 address.
    #[error("invalid address field: {0}")]
    InvalidAddress(String),

    /// The address text exceeds the longest valid textual address.
    #[error("address too long ({len} bytes, max {max})")]
    AddressTooLong { len: usize, max: usize },

    /// The metadata payload exceeds the configured maximum size.
    #[error("metadata too large ({size} bytes, max {max})")]
    MetadataTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading commands.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed between commands.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection was closed partway through a command.
    #[error("connection closed while reading {} field", .field.name())]
    Truncated { field: FieldKind },
}

pub type Result<T> = std::result::Result<T, FrameError>;
