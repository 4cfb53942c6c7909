//! Command model and length-prefixed framing for the command client.
//!
//! Every command travels as five fields, all integers little-endian:
//! - A 4-byte kind code
//! - A 4-byte address length followed by the textual address
//! - A 4-byte metadata length followed by the metadata payload
//!
//! The encoder keeps the fields separate so a sender can write and flush
//! each one on its own.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;

pub use codec::{
    buffered_fields, decode_command, encode_command, AbsentMetadata, EncodedCommand, FieldKind,
    FrameConfig, DEFAULT_MAX_METADATA, FIELD_COUNT, LEGACY_METADATA_PLACEHOLDER, LENGTH_SIZE,
    MAX_ADDRESS_LEN,
};
pub use command::{decode_text_metadata, encode_text_metadata, Command, CommandKind};
pub use error::{FrameError, Result};
pub use reader::CommandReader;
