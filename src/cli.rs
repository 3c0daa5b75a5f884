//! Command line interface.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "flip-detector", version, about = "Cross-market flip detection and live broadcast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll prices, detect flips and publish them to the broadcast server.
    Worker {
        /// Overrides SERVER_URL.
        #[arg(long)]
        server_url: Option<String>,
    },
    /// Run the broadcast server.
    Server {
        /// Overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Subscribe to the broadcast server and log incoming events.
    Watch {
        /// Overrides SERVER_URL.
        #[arg(long)]
        server_url: Option<String>,
        /// Rooms to join, e.g. `item:T4_SWORD`. Global events arrive regardless.
        #[arg(long = "room")]
        rooms: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_with_rooms() {
        let cli = Cli::parse_from([
            "flip-detector",
            "watch",
            "--room",
            "item:T4_SWORD",
            "--room",
            "item:T4_HELMET",
        ]);
        match cli.command {
            Command::Watch { server_url, rooms } => {
                assert!(server_url.is_none());
                assert_eq!(rooms, vec!["item:T4_SWORD", "item:T4_HELMET"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_server_port() {
        let cli = Cli::parse_from(["flip-detector", "server", "--port", "4100"]);
        assert!(matches!(cli.command, Command::Server { port: Some(4100) }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["flip-detector"]).is_err());
    }
}
