//! Permit-guarded command sender.
//!
//! A [`GuardedSender`] owns the output stream and a [`Permit`]. Each
//! [`send`](GuardedSender::send) takes the permit, writes the five command
//! fields with a flush after every field, and hands the permit back on every
//! exit path, including failed writes and panics inside the sink.

pub mod error;
pub mod permit;
pub mod sender;

#[cfg(feature = "async")]
pub mod async_sender;

pub use error::{Result, SendError};
pub use permit::{Permit, PermitGuard, SendLock};
pub use sender::{GuardedSender, SenderConfig, DEFAULT_SENDER_NAME};

#[cfg(feature = "async")]
pub use async_sender::AsyncGuardedSender;
