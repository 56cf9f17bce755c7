//! Connects to the chat server, pings it, then announces itself to every
//! other client and prints greetings for a few seconds.
//!
//! Run with:
//!   cargo run --example chat-client -- [HOST] [PORT]

use std::time::{Duration, Instant};

use msgnet::demo::DemoMessage;
use msgnet::frame::Message;
use msgnet::peer::Client;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(60000);

    let client: Client<DemoMessage> = Client::with_defaults()?;
    client.connect(&host, port)?;

    let origin = Instant::now();
    let mut ping = Message::new(DemoMessage::ServerPing);
    ping.append(&(origin.elapsed().as_micros() as u64))?;
    client.send(ping)?;
    client.send(Message::new(DemoMessage::MessageAll))?;

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline && client.is_connected() {
        if !client.incoming().wait_timeout(Duration::from_millis(100)) {
            continue;
        }
        while let Some(owned) = client.incoming().pop_front() {
            let mut msg = owned.into_message();
            match msg.id() {
                DemoMessage::ServerAccept => println!("Server accepted connection"),
                DemoMessage::ServerDeny => println!("Server denied connection"),
                DemoMessage::ServerPing => {
                    let sent: u64 = msg.extract()?;
                    let now = origin.elapsed().as_micros() as u64;
                    println!("Ping: {} us", now.saturating_sub(sent));
                }
                DemoMessage::ServerMessage => {
                    let from: u32 = msg.extract()?;
                    println!("Hello from [{from}]");
                }
                DemoMessage::MessageAll => {}
            }
        }
    }

    Ok(())
}
