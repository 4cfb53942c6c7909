use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use cmdclient_frame::encode_command;
use cmdclient_sender::{GuardedSender, SenderConfig};
use tracing::{debug, info};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    frame_error, send_error, transport_io_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let command = args.command.build()?;
    let config = SenderConfig {
        name: args.name.clone(),
        frame: args.command.frame_config(),
        acquire_timeout: None,
    };
    // Fail on bad input before touching the network.
    let wire_size = encode_command(&command, &config.frame)
        .map_err(|err| frame_error("encode failed", err))?
        .wire_size();

    let stream = connect(&args.server, connect_timeout)?;
    let sender = GuardedSender::with_config(stream, config);
    sender
        .send(&command)
        .map_err(|err| send_error("send failed", err))?;
    info!(server = %args.server, sender = sender.name(), kind = %command.kind(), "command sent");

    print_sent(&args.server, sender.name(), &command, wire_size, format);
    Ok(SUCCESS)
}

fn connect(server: &str, timeout: Duration) -> CliResult<TcpStream> {
    let addrs = server
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("invalid server address {server}: {err}")))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                // Each field is flushed on its own; don't let Nagle coalesce them.
                stream
                    .set_nodelay(true)
                    .map_err(|err| transport_io_error("configure connection failed", err))?;
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(match last_err {
        Some(err) => transport_io_error(&format!("connect to {server} failed"), err),
        None => CliError::new(USAGE, format!("{server} did not resolve to any address")),
    })
}
