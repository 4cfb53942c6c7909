//! Command kinds and the immutable command value.
//!
//! Kind codes are part of the wire format and never change once assigned.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use bytes::Bytes;

/// Closed set of instructions a client can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandKind {
    /// The user is leaving; the server drops the client session.
    UserExit = 0,
    PcLock = 1,
    PcRestart = 2,
    PcLogOff = 3,
    PcShutdown = 4,
    /// Free-form text message; the text travels in the metadata field.
    Message = 5,
    ClientListRequest = 6,
    ClientLoginInform = 7,
    ClientLogOffInform = 8,
    NameExists = 9,
    IsNameExists = 10,
    SendClientList = 11,
    FreeCommand = 12,
}

impl CommandKind {
    /// Every kind, ordered by wire code.
    pub const ALL: &'static [CommandKind] = &[
        CommandKind::UserExit,
        CommandKind::PcLock,
        CommandKind::PcRestart,
        CommandKind::PcLogOff,
        CommandKind::PcShutdown,
        CommandKind::Message,
        CommandKind::ClientListRequest,
        CommandKind::ClientLoginInform,
        CommandKind::ClientLogOffInform,
        CommandKind::NameExists,
        CommandKind::IsNameExists,
        CommandKind::SendClientList,
        CommandKind::FreeCommand,
    ];

    /// The 4-byte wire code for this kind.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a kind by wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    /// Kebab-case name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::UserExit => "user-exit",
            CommandKind::PcLock => "pc-lock",
            CommandKind::PcRestart => "pc-restart",
            CommandKind::PcLogOff => "pc-log-off",
            CommandKind::PcShutdown => "pc-shutdown",
            CommandKind::Message => "message",
            CommandKind::ClientListRequest => "client-list-request",
            CommandKind::ClientLoginInform => "client-login-inform",
            CommandKind::ClientLogOffInform => "client-log-off-inform",
            CommandKind::NameExists => "name-exists",
            CommandKind::IsNameExists => "is-name-exists",
            CommandKind::SendClientList => "send-client-list",
            CommandKind::FreeCommand => "free-command",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("unknown command kind: {s}"))
    }
}

/// One outgoing instruction.
///
/// Built by the caller right before a send and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    address: Option<IpAddr>,
    metadata: Option<Bytes>,
}

impl Command {
    /// Create a command with no address and no metadata.
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            address: None,
            metadata: None,
        }
    }

    /// Attach the network address the command refers to.
    pub fn with_address(mut self, address: impl Into<IpAddr>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attach an opaque metadata payload.
    pub fn with_metadata(mut self, metadata: impl Into<Bytes>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Attach text metadata, encoded as UTF-16LE.
    pub fn with_text_metadata(self, text: &str) -> Self {
        self.with_metadata(encode_text_metadata(text))
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn address(&self) -> Option<IpAddr> {
        self.address
    }

    pub fn metadata(&self) -> Option<&Bytes> {
        self.metadata.as_ref()
    }
}

/// Encode text as UTF-16LE, the convention receivers use for text metadata.
pub fn encode_text_metadata(text: &str) -> Bytes {
    text.encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect::<Vec<u8>>()
        .into()
}

/// Decode UTF-16LE text metadata. Returns `None` for odd lengths or unpaired surrogates.
pub fn decode_text_metadata(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}
