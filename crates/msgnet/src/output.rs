use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of command output.
#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Listening {
        addr: SocketAddr,
    },
    Pong {
        seq: u32,
        addr: String,
        size: usize,
        rtt_ms: f64,
    },
    ServerMessage {
        addr: String,
        from: u32,
    },
    Stopped {
        pings: u64,
        broadcasts: u64,
    },
}

#[derive(Serialize)]
struct Stamped<'a> {
    #[serde(flatten)]
    event: &'a Event,
    timestamp: String,
}

impl Event {
    pub fn pong(seq: u32, addr: &str, size: usize, rtt: Duration) -> Self {
        Event::Pong {
            seq,
            addr: addr.to_string(),
            size,
            rtt_ms: rtt.as_secs_f64() * 1000.0,
        }
    }

    fn columns(&self) -> (Vec<&'static str>, Vec<String>) {
        match self {
            Event::Listening { addr } => (vec!["EVENT", "ADDR"], vec!["listening".into(), addr.to_string()]),
            Event::Pong {
                seq,
                addr,
                size,
                rtt_ms,
            } => (
                vec!["SEQ", "ADDR", "SIZE", "RTT"],
                vec![seq.to_string(), addr.clone(), size.to_string(), format!("{rtt_ms:.3} ms")],
            ),
            Event::ServerMessage { addr, from } => (
                vec!["EVENT", "ADDR", "FROM"],
                vec!["server_message".into(), addr.clone(), from.to_string()],
            ),
            Event::Stopped { pings, broadcasts } => (
                vec!["EVENT", "PINGS", "BROADCASTS"],
                vec!["stopped".into(), pings.to_string(), broadcasts.to_string()],
            ),
        }
    }

    fn pretty(&self) -> String {
        match self {
            Event::Listening { addr } => format!("listening on {addr}"),
            Event::Pong {
                seq,
                addr,
                size,
                rtt_ms,
            } => format!("pong from {addr}: seq={seq} size={size} time={rtt_ms:.3} ms"),
            Event::ServerMessage { addr, from } => format!("hello from [{from}] via {addr}"),
            Event::Stopped { pings, broadcasts } => {
                format!("stopped after {pings} pings and {broadcasts} broadcasts")
            }
        }
    }
}

pub fn print_event(event: &Event, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = Stamped {
                event,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let (header, row) = event.columns();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", event.pretty()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
