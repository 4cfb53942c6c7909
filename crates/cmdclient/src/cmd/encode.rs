use cmdclient_frame::encode_command;
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command = args.command.build()?;
    let encoded = encode_command(&command, &args.command.frame_config())
        .map_err(|err| frame_error("encode failed", err))?;
    debug!(kind = %command.kind(), wire_size = encoded.wire_size(), "encoded command");

    print_encoded(&command, &encoded, format);
    Ok(SUCCESS)
}
