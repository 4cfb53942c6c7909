use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{buffered_fields, decode_command, FieldKind, FrameConfig};
use crate::command::Command;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete commands from any `Read` stream.
///
/// Senders flush each field on its own, so a command usually arrives in
/// pieces. The reader tracks how many fields of the next command are
/// buffered and names the field that was cut short when the stream ends
/// partway through a command.
pub struct CommandReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    commands_read: u64,
}

impl<T: Read> CommandReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            commands_read: 0,
        }
    }

    /// Read the next complete command (blocking).
    ///
    /// EOF between commands yields [`FrameError::ConnectionClosed`]; EOF
    /// inside one yields [`FrameError::Truncated`].
    pub fn read_command(&mut self) -> Result<Command> {
        loop {
            if let Some(command) = decode_command(&mut self.buf, &self.config)? {
                self.commands_read += 1;
                trace!(kind = %command.kind(), seq = self.commands_read, "command decoded");
                return Ok(command);
            }

            if self.fill()? == 0 {
                return Err(self.closed_error());
            }
        }
    }

    /// Fields of the next command already buffered, `0..=FIELD_COUNT`.
    pub fn pending_fields(&self) -> usize {
        buffered_fields(&self.buf)
    }

    /// Commands decoded so far.
    pub fn commands_read(&self) -> u64 {
        self.commands_read
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(read) => {
                    self.buf.extend_from_slice(&chunk[..read]);
                    if read > 0 {
                        trace!(read, fields = self.pending_fields(), "command bytes buffered");
                    }
                    return Ok(read);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn closed_error(&self) -> FrameError {
        if self.buf.is_empty() {
            return FrameError::ConnectionClosed;
        }
        let field = FieldKind::ORDER
            .get(self.pending_fields())
            .copied()
            .unwrap_or(FieldKind::Metadata);
        FrameError::Truncated { field }
    }
}
