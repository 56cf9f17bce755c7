use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use msgnet::demo::DemoServer;
use msgnet::peer::{Server, ServerConfig};
use tracing::info;

use crate::cmd::ServerArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

const POLL: Duration = Duration::from_millis(100);

pub fn run(args: ServerArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ServerConfig {
        bind: args.bind,
        first_client_id: args.first_client_id,
        ..ServerConfig::default()
    };
    let mut server = Server::new(config, DemoServer::new(args.max_clients))
        .map_err(|err| peer_error("server setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let addr = server
        .start()
        .map_err(|err| peer_error("bind failed", err))?;
    print_event(&Event::Listening { addr }, format);

    while running.load(Ordering::SeqCst) {
        server.incoming().wait_timeout(POLL);
        server.update(-1, false);
    }

    info!("shutting down");
    server.stop();
    let (pings, broadcasts) = {
        let demo = server.handler();
        (demo.pings(), demo.broadcasts())
    };
    print_event(&Event::Stopped { pings, broadcasts }, format);

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
