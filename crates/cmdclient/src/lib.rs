//! Framed command transport for the command client.
//!
//! A client builds a [`Command`](frame::Command), and a
//! [`GuardedSender`](sender::GuardedSender) writes it to a shared stream as
//! five length-prefixed fields, one sender at a time.
//!
//! # Crate Structure
//!
//! - [`frame`]: Command model, frame encoder and mirrored decoder
//! - [`sender`]: Permit-guarded sender (async variant behind the `async` feature)

/// Re-export frame types.
pub mod frame {
    pub use cmdclient_frame::*;
}

/// Re-export sender types.
pub mod sender {
    pub use cmdclient_sender::*;
}
