mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "msgnet", version, about = "Framed TCP messaging demo client and server")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_subcommand() {
        let cli = Cli::try_parse_from(["msgnet", "server", "--bind", "0.0.0.0:7000"])
            .expect("server args should parse");

        let Command::Server(args) = cli.command else {
            panic!("expected server command");
        };
        assert_eq!(args.bind.port(), 7000);
        assert_eq!(args.first_client_id, 10000);
        assert!(args.max_clients.is_none());
    }

    #[test]
    fn rejects_unparseable_bind_address() {
        let err = Cli::try_parse_from(["msgnet", "server", "--bind", "not-an-addr"])
            .expect_err("bad bind should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_ping_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "msgnet",
            "ping",
            "localhost:60000",
            "--count",
            "3",
            "--format",
            "json",
            "--log-level",
            "off",
        ])
        .expect("ping args should parse");

        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.log_level, LogLevel::Off);
        let Command::Ping(args) = cli.command else {
            panic!("expected ping command");
        };
        assert_eq!(args.count, 3);
        assert_eq!(args.timeout, "5s");
    }

    #[test]
    fn parses_message_all_subcommand() {
        let cli = Cli::try_parse_from(["msgnet", "message-all", "127.0.0.1:1", "--listen-for", "250ms"])
            .expect("message-all args should parse");
        assert!(matches!(cli.command, Command::MessageAll(_)));
    }
}
