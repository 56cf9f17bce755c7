use std::time::{Duration, Instant};

use msgnet::demo::DemoMessage;
use msgnet::frame::Message;

use crate::cmd::{connect_demo, parse_duration, wait_for, PingArgs};
use crate::exit::{frame_error, peer_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_event, Event, OutputFormat};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == 0 {
        return Err(CliError::new(USAGE, "--count must be at least 1"));
    }
    let timeout = parse_duration(&args.timeout)?;
    let client = connect_demo(&args.addr, timeout)?;
    let origin = Instant::now();

    for seq in 1..=args.count {
        let mut ping = Message::new(DemoMessage::ServerPing);
        ping.append(&elapsed_nanos(origin))
            .map_err(|err| frame_error("ping build failed", err))?;
        client
            .send(ping)
            .map_err(|err| peer_error("send failed", err))?;

        let deadline = Instant::now() + timeout;
        let mut reply = wait_for(&client, DemoMessage::ServerPing, deadline)?.ok_or_else(|| {
            CliError::new(TIMEOUT, format!("no reply to ping {seq} within {timeout:?}"))
        })?;
        let size = reply.size();
        let sent: u64 = reply
            .extract()
            .map_err(|err| frame_error("malformed ping reply", err))?;
        let rtt = Duration::from_nanos(elapsed_nanos(origin).saturating_sub(sent));

        print_event(&Event::pong(seq, &args.addr, size, rtt), format);
    }

    client.disconnect();
    Ok(SUCCESS)
}

fn elapsed_nanos(origin: Instant) -> u64 {
    u64::try_from(origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
