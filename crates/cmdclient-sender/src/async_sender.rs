//! Async counterpart of [`GuardedSender`](crate::GuardedSender).
//!
//! The permit is a one-slot `tokio::sync::Semaphore`. Its RAII permit is
//! returned when the send future completes, fails, or is dropped mid-write.

use std::io::ErrorKind;

use cmdclient_frame::{encode_command, Command, FieldKind};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, trace, warn};

use crate::error::{Result, SendError};
use crate::sender::SenderConfig;

/// Writes framed commands to a shared async sink, one task at a time.
pub struct AsyncGuardedSender<W> {
    sink: Mutex<W>,
    permit: Semaphore,
    config: SenderConfig,
}

impl<W: AsyncWrite + Unpin + Send> AsyncGuardedSender<W> {
    /// Create a sender with default configuration.
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, SenderConfig::default())
    }

    /// Create a sender with explicit configuration.
    pub fn with_config(sink: W, config: SenderConfig) -> Self {
        Self {
            sink: Mutex::new(sink),
            permit: Semaphore::new(1),
            config,
        }
    }

    /// Send one command.
    ///
    /// Same field order, per-field flush and failure semantics as the
    /// blocking sender.
    pub async fn send(&self, command: &Command) -> Result<()> {
        let _permit = self.acquire().await?;

        let encoded = encode_command(command, &self.config.frame)?;
        debug!(
            sender = %self.config.name,
            kind = %command.kind(),
            wire_size = encoded.wire_size(),
            "sending command"
        );

        let mut sink = self.sink.lock().await;
        for (field, bytes) in encoded.fields() {
            if let Err(err) = write_field(&mut *sink, field, bytes).await {
                warn!(
                    sender = %self.config.name,
                    kind = %command.kind(),
                    field = field.name(),
                    error = %err,
                    "command write failed"
                );
                return Err(err);
            }
        }

        Ok(())
    }

    /// Refuse further sends. Sends already holding the permit finish.
    pub fn close(&self) {
        self.permit.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permit.is_closed()
    }

    /// Client network name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Permits currently available; 1 whenever no send is in progress.
    pub fn available_permits(&self) -> usize {
        self.permit.available_permits()
    }

    /// Consume the sender and return the sink.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        let acquire = self.permit.acquire();
        let permit = match self.config.acquire_timeout {
            None => acquire.await,
            Some(timeout) => tokio::time::timeout(timeout, acquire)
                .await
                .map_err(|_| SendError::Timeout(timeout))?,
        };
        permit.map_err(|_| SendError::Closed)
    }
}

impl<W> std::fmt::Debug for AsyncGuardedSender<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncGuardedSender")
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

async fn write_field<W: AsyncWrite + Unpin + ?Sized>(
    sink: &mut W,
    field: FieldKind,
    bytes: &[u8],
) -> Result<()> {
    let mut offset = 0usize;
    loop {
        match sink.write(&bytes[offset..]).await {
            Ok(0) if offset < bytes.len() => return Err(SendError::ConnectionClosed { field }),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(SendError::Io { field, source }),
        }
        if offset >= bytes.len() {
            break;
        }
    }

    sink.flush()
        .await
        .map_err(|source| SendError::Io { field, source })?;

    trace!(field = field.name(), len = bytes.len(), "field written");
    Ok(())
}
