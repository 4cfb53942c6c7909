use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use cmdclient_frame::{AbsentMetadata, CommandKind, FrameConfig};
use cmdclient_sender::DEFAULT_SENDER_NAME;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod kinds;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a server and send a single command.
    Send(SendArgs),
    /// Print the encoded frame of a command without sending it.
    Encode(EncodeArgs),
    /// List command kinds and their wire codes.
    Kinds(KindsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Kinds(args) => kinds::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Flags describing the command to build.
#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Command kind (see `cmdclient kinds`).
    #[arg(long, short = 'k', default_value = "user-exit")]
    pub kind: CommandKind,
    /// Network address carried by the command.
    #[arg(long, short = 'a')]
    pub address: Option<IpAddr>,
    /// Text metadata, sent as UTF-16LE.
    #[arg(long, conflicts_with_all = ["metadata_hex", "metadata_file"])]
    pub metadata: Option<String>,
    /// Raw metadata as hex (e.g. 0a00).
    #[arg(long, conflicts_with_all = ["metadata", "metadata_file"])]
    pub metadata_hex: Option<String>,
    /// Read raw metadata from a file.
    #[arg(long, conflicts_with_all = ["metadata", "metadata_hex"])]
    pub metadata_file: Option<PathBuf>,
    /// Write absent metadata as a zero-length field instead of the legacy placeholder.
    #[arg(long)]
    pub empty_metadata: bool,
}

impl CommandArgs {
    pub fn build(&self) -> CliResult<cmdclient_frame::Command> {
        let mut command = cmdclient_frame::Command::new(self.kind);
        if let Some(address) = self.address {
            command = command.with_address(address);
        }
        if let Some(text) = &self.metadata {
            command = command.with_text_metadata(text);
        }
        if let Some(hex_text) = &self.metadata_hex {
            let bytes = hex::decode(hex_text.trim()).map_err(|err| {
                CliError::new(USAGE, format!("--metadata-hex is not valid hex: {err}"))
            })?;
            command = command.with_metadata(bytes);
        }
        if let Some(path) = &self.metadata_file {
            let bytes = std::fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
            command = command.with_metadata(bytes);
        }
        Ok(command)
    }

    pub fn frame_config(&self) -> FrameConfig {
        let absent_metadata = if self.empty_metadata {
            AbsentMetadata::Empty
        } else {
            AbsentMetadata::legacy()
        };
        FrameConfig {
            absent_metadata,
            ..FrameConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server to connect to (host:port).
    #[arg(env = "CMDCLIENT_SERVER")]
    pub server: String,
    /// Client network name.
    #[arg(long, env = "CMDCLIENT_NAME", default_value = DEFAULT_SENDER_NAME)]
    pub name: String,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    #[command(flatten)]
    pub command: CommandArgs,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub command: CommandArgs,
}

#[derive(Args, Debug, Default)]
pub struct KindsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
