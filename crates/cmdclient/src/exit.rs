use std::fmt;
use std::io;

use cmdclient_frame::FrameError;
use cmdclient_sender::SendError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Local I/O (reading input files, writing stdout).
pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// I/O on the connection to the server.
pub fn transport_io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(transport_code(err.kind()), format!("{context}: {err}"))
}

fn transport_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        _ => TRANSPORT_ERROR,
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => transport_io_error(context, source),
        FrameError::ConnectionClosed | FrameError::Truncated { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        FrameError::MetadataTooLarge { .. }
        | FrameError::AddressTooLong { .. }
        | FrameError::InvalidAddress(_)
        | FrameError::UnknownKind(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn send_error(context: &str, err: SendError) -> CliError {
    let code = match err {
        SendError::Frame(frame) => return frame_error(context, frame),
        SendError::Io { ref source, .. } => transport_code(source.kind()),
        SendError::ConnectionClosed { .. } => TRANSPORT_ERROR,
        SendError::Timeout(_) => TIMEOUT,
        #[allow(unreachable_patterns)]
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}
