use std::time::Instant;

use msgnet::demo::DemoMessage;
use msgnet::frame::Message;
use tracing::debug;

use crate::cmd::{connect_demo, next_message, parse_duration, MessageAllArgs};
use crate::exit::{frame_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub fn run(args: MessageAllArgs, format: OutputFormat) -> CliResult<i32> {
    let listen_for = parse_duration(&args.listen_for)?;
    let timeout = parse_duration(&args.timeout)?;
    let client = connect_demo(&args.addr, timeout)?;

    client
        .send(Message::new(DemoMessage::MessageAll))
        .map_err(|err| peer_error("send failed", err))?;

    let deadline = Instant::now() + listen_for;
    let mut received = 0usize;
    while let Some(mut msg) = next_message(&client, deadline)? {
        if msg.id() != DemoMessage::ServerMessage {
            debug!(id = msg.id().name(), "ignoring message");
            continue;
        }
        let from: u32 = msg
            .extract()
            .map_err(|err| frame_error("malformed server message", err))?;
        print_event(
            &Event::ServerMessage {
                addr: args.addr.clone(),
                from,
            },
            format,
        );
        received += 1;
    }

    debug!(received, "listen window closed");
    client.disconnect();
    Ok(SUCCESS)
}
