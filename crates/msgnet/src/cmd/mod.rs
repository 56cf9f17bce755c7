use std::net::SocketAddr;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use msgnet::demo::DemoMessage;
use msgnet::frame::Message;
use msgnet::peer::{Client, ClientConfig};

use crate::exit::{peer_error, CliError, CliResult, FAILURE, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod message_all;
pub mod ping;
pub mod server;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo chat server.
    Server(ServerArgs),
    /// Time round trips to a server.
    Ping(PingArgs),
    /// Ask the server to greet every other client, then print greetings.
    MessageAll(MessageAllArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Server(args) => server::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::MessageAll(args) => message_all::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Address to listen on. Port 0 picks a free port.
    #[arg(long, env = "MSGNET_BIND", default_value = "127.0.0.1:60000")]
    pub bind: SocketAddr,
    /// Refuse connections beyond this many clients.
    #[arg(long)]
    pub max_clients: Option<usize>,
    /// First id handed to an accepted client.
    #[arg(long, default_value = "10000")]
    pub first_client_id: u32,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Server address (HOST:PORT).
    pub addr: String,
    /// Number of pings to send.
    #[arg(long, short = 'c', default_value = "1")]
    pub count: u32,
    /// Connect and per-reply timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct MessageAllArgs {
    /// Server address (HOST:PORT).
    pub addr: String,
    /// How long to keep printing greetings after sending (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub listen_for: String,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

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

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Split `HOST:PORT`. Bracketed IPv6 hosts (`[::1]:80`) are unwrapped.
pub fn parse_target(addr: &str) -> CliResult<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("expected HOST:PORT, got {addr}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(CliError::new(USAGE, format!("missing host in {addr}")));
    }
    let port = port
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid port in {addr}")))?;
    Ok((host.to_string(), port))
}

/// Connect and wait for the server's `ServerAccept`.
pub fn connect_demo(addr: &str, timeout: Duration) -> CliResult<Client<DemoMessage>> {
    let (host, port) = parse_target(addr)?;
    let client = Client::new(ClientConfig {
        connect_timeout: timeout,
        ..ClientConfig::default()
    })
    .map_err(|err| peer_error("client setup failed", err))?;
    client
        .connect(&host, port)
        .map_err(|err| peer_error("connect failed", err))?;

    let deadline = Instant::now() + timeout;
    match wait_for(&client, DemoMessage::ServerAccept, deadline)? {
        Some(_) => Ok(client),
        None => Err(CliError::new(
            TIMEOUT,
            format!("{addr} did not accept within {timeout:?}"),
        )),
    }
}

/// Next received message, or `None` once `deadline` passes.
pub fn next_message(
    client: &Client<DemoMessage>,
    deadline: Instant,
) -> CliResult<Option<Message<DemoMessage>>> {
    loop {
        if let Some(owned) = client.incoming().pop_front() {
            return Ok(Some(owned.into_message()));
        }
        if !client.is_connected() {
            return Err(CliError::new(FAILURE, "server closed the connection"));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        client
            .incoming()
            .wait_timeout(remaining.min(Duration::from_millis(100)));
    }
}

/// Skip messages until one of `kind` arrives or `deadline` passes.
pub fn wait_for(
    client: &Client<DemoMessage>,
    kind: DemoMessage,
    deadline: Instant,
) -> CliResult<Option<Message<DemoMessage>>> {
    while let Some(msg) = next_message(client, deadline)? {
        if msg.id() == kind {
            return Ok(Some(msg));
        }
        if msg.id() == DemoMessage::ServerDeny {
            return Err(CliError::new(FAILURE, "server denied the connection"));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").expect("2s"), Duration::from_secs(2));
        assert_eq!(
            parse_duration("150ms").expect("150ms"),
            Duration::from_millis(150)
        );
        assert_eq!(parse_duration("3").expect("3"), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }

    #[test]
    fn parse_target_splits_host_and_port() {
        assert_eq!(
            parse_target("localhost:60000").expect("target should parse"),
            ("localhost".to_string(), 60000)
        );
        assert_eq!(
            parse_target("[::1]:7").expect("ipv6 target should parse"),
            ("::1".to_string(), 7)
        );
    }

    #[test]
    fn parse_target_rejects_malformed_input() {
        for bad in ["localhost", ":80", "host:notaport", "host:70000"] {
            let err = parse_target(bad).expect_err("target should be rejected");
            assert_eq!(err.code, USAGE, "{bad}");
        }
    }
}
