use std::net::IpAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{Command, CommandKind};
use crate::error::{FrameError, Result};

/// Size of the kind code and of each length prefix.
pub const LENGTH_SIZE: usize = 4;

/// Number of separately written fields in one command frame.
pub const FIELD_COUNT: usize = 5;

/// Longest address text accepted (IPv6 text tops out at 45 bytes).
pub const MAX_ADDRESS_LEN: usize = 64;

/// Default maximum metadata size: 16 MiB.
pub const DEFAULT_MAX_METADATA: usize = 16 * 1024 * 1024;

/// Bytes written for absent metadata by default: `"\n"` in UTF-16LE.
pub const LEGACY_METADATA_PLACEHOLDER: [u8; 2] = [0x0A, 0x00];

/// The fields of a command frame, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Kind,
    AddressLength,
    Address,
    MetadataLength,
    Metadata,
}

impl FieldKind {
    /// All fields in the order they are written.
    pub const ORDER: [FieldKind; FIELD_COUNT] = [
        FieldKind::Kind,
        FieldKind::AddressLength,
        FieldKind::Address,
        FieldKind::MetadataLength,
        FieldKind::Metadata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Kind => "kind",
            FieldKind::AddressLength => "address_length",
            FieldKind::Address => "address",
            FieldKind::MetadataLength => "metadata_length",
            FieldKind::Metadata => "metadata",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// What an absent metadata value encodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsentMetadata {
    /// Write these bytes in place of the missing payload.
    Placeholder(Bytes),
    /// Write a zero-length metadata field.
    Empty,
}

impl AbsentMetadata {
    /// The placeholder legacy receivers expect (`[0x0A, 0x00]`).
    pub fn legacy() -> Self {
        Self::Placeholder(Bytes::from_static(&LEGACY_METADATA_PLACEHOLDER))
    }

    fn payload(&self) -> Bytes {
        match self {
            Self::Placeholder(bytes) => bytes.clone(),
            Self::Empty => Bytes::new(),
        }
    }

    fn is_absent(&self, payload: &[u8]) -> bool {
        match self {
            Self::Placeholder(bytes) => bytes.as_ref() == payload,
            Self::Empty => payload.is_empty(),
        }
    }
}

impl Default for AbsentMetadata {
    fn default() -> Self {
        Self::legacy()
    }
}

/// Configuration for command encoding and decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum metadata size in bytes. Default: 16 MiB.
    pub max_metadata_size: usize,
    /// Encoding used when a command carries no metadata.
    pub absent_metadata: AbsentMetadata,
}

impl FrameConfig {
    fn metadata_limit(&self) -> usize {
        self.max_metadata_size.min(u32::MAX as usize)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_metadata_size: DEFAULT_MAX_METADATA,
            absent_metadata: AbsentMetadata::default(),
        }
    }
}

/// A command rendered into its five wire fields.
///
/// The chunks share one allocation; each is written and flushed on its own.
#[derive(Debug, Clone)]
pub struct EncodedCommand {
    fields: [Bytes; FIELD_COUNT],
}

impl EncodedCommand {
    /// Fields in wire order, each paired with its kind.
    pub fn fields(&self) -> impl Iterator<Item = (FieldKind, &Bytes)> {
        FieldKind::ORDER.into_iter().zip(self.fields.iter())
    }

    /// The bytes of one field.
    pub fn field(&self, kind: FieldKind) -> &Bytes {
        &self.fields[kind.index()]
    }

    /// Total bytes written to the sink for this command.
    pub fn wire_size(&self) -> usize {
        self.fields.iter().map(Bytes::len).sum()
    }

    /// The whole frame as one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        for field in &self.fields {
            buf.put_slice(field);
        }
        buf.freeze()
    }
}

/// Encode a command into its wire fields.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────────┬──────────────┬────────────┬──────────────┐
/// │ Kind      │ Addr len   │ Address      │ Meta len   │ Metadata     │
/// │ (4B LE)   │ (4B LE)    │ (ASCII text) │ (4B LE)    │ (opaque)     │
/// └───────────┴────────────┴──────────────┴────────────┴──────────────┘
/// ```
///
/// Nothing is returned unless the whole command fits the configured limits.
pub fn encode_command(command: &Command, config: &FrameConfig) -> Result<EncodedCommand> {
    let address = command
        .address()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    if address.len() > MAX_ADDRESS_LEN {
        return Err(FrameError::AddressTooLong {
            len: address.len(),
            max: MAX_ADDRESS_LEN,
        });
    }

    let metadata = match command.metadata() {
        Some(bytes) => bytes.clone(),
        None => config.absent_metadata.payload(),
    };
    let max = config.metadata_limit();
    if metadata.len() > max {
        return Err(FrameError::MetadataTooLarge {
            size: metadata.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(3 * LENGTH_SIZE + address.len() + metadata.len());
    buf.put_u32_le(command.kind().code());
    buf.put_u32_le(address.len() as u32);
    buf.put_slice(address.as_bytes());
    buf.put_u32_le(metadata.len() as u32);
    buf.put_slice(&metadata);

    let mut wire = buf.freeze();
    let kind = wire.split_to(LENGTH_SIZE);
    let address_length = wire.split_to(LENGTH_SIZE);
    let address = wire.split_to(address.len());
    let metadata_length = wire.split_to(LENGTH_SIZE);

    Ok(EncodedCommand {
        fields: [kind, address_length, address, metadata_length, wire],
    })
}

/// Decode a command from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete command yet.
/// On success, consumes the command bytes from the buffer.
pub fn decode_command(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Command>> {
    if src.len() < 2 * LENGTH_SIZE {
        return Ok(None);
    }

    let mut header = &src[..2 * LENGTH_SIZE];
    let code = header.get_u32_le();
    let address_len = header.get_u32_le() as usize;

    let kind = CommandKind::from_code(code).ok_or(FrameError::UnknownKind(code))?;
    if address_len > MAX_ADDRESS_LEN {
        return Err(FrameError::AddressTooLong {
            len: address_len,
            max: MAX_ADDRESS_LEN,
        });
    }

    let metadata_len_at = 2 * LENGTH_SIZE + address_len;
    if src.len() < metadata_len_at + LENGTH_SIZE {
        return Ok(None);
    }
    let metadata_len = (&src[metadata_len_at..]).get_u32_le() as usize;
    let max = config.metadata_limit();
    if metadata_len > max {
        return Err(FrameError::MetadataTooLarge {
            size: metadata_len,
            max,
        });
    }

    let total = metadata_len_at + LENGTH_SIZE + metadata_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(2 * LENGTH_SIZE);
    let address_bytes = src.split_to(address_len);
    src.advance(LENGTH_SIZE);
    let metadata = src.split_to(metadata_len).freeze();

    let mut command = Command::new(kind);
    if !address_bytes.is_empty() {
        command = command.with_address(parse_address(&address_bytes)?);
    }
    if !config.absent_metadata.is_absent(&metadata) {
        command = command.with_metadata(metadata);
    }
    Ok(Some(command))
}

/// Number of leading fields of the next command that are fully buffered.
///
/// Returns [`FIELD_COUNT`] once the whole command is present. Lengths are
/// read as-is; limits are checked by [`decode_command`].
pub fn buffered_fields(src: &[u8]) -> usize {
    let prefix_at = |at: usize| {
        src.get(at..at + LENGTH_SIZE)
            .map(|mut prefix| prefix.get_u32_le() as usize)
    };

    let mut end = 0usize;
    for (complete, field) in FieldKind::ORDER.into_iter().enumerate() {
        let len = match field {
            FieldKind::Address | FieldKind::Metadata => match prefix_at(end - LENGTH_SIZE) {
                Some(len) => len,
                None => return complete,
            },
            _ => LENGTH_SIZE,
        };
        end = end.saturating_add(len);
        if src.len() < end {
            return complete;
        }
    }
    FIELD_COUNT
}

fn parse_address(bytes: &[u8]) -> Result<IpAddr> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| FrameError::InvalidAddress(format!("{} non-text bytes", bytes.len())))?;
    text.parse()
        .map_err(|_| FrameError::InvalidAddress(text.to_string()))
}
