//! Demo chat server on the default port.
//!
//! Run with:
//!   cargo run --example chat-server
//!
//! Then in other terminals:
//!   cargo run --example chat-client

use msgnet::demo::DemoServer;
use msgnet::peer::{Server, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new(ServerConfig::default(), DemoServer::new(None))?;
    let addr = server.start()?;
    eprintln!("Listening on {addr}");

    loop {
        // Blocks until a client sends something.
        server.update(-1, true);
        let demo = server.handler();
        eprintln!(
            "clients={} pings={} broadcasts={}",
            demo.active_clients(),
            demo.pings(),
            demo.broadcasts()
        );
    }
}
