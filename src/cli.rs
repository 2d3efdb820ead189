//! Command line interface for the `linkbroker` binary.
//!
//! Shared with `build.rs`, which renders the man page from it, so it must
//! not depend on the library crate.

use clap::Parser;

/// Command line arguments for the `linkbroker` binary.
#[derive(Debug, Parser)]
#[command(
    name = "linkbroker",
    version,
    about = "Link-protocol front-end moving messages between links and queue storage"
)]
pub struct Cli {
    /// Listening endpoint as `scheme://host[:port]`.
    #[arg(short, long, default_value = "amqp://127.0.0.1:8888")]
    pub bind: String,

    /// Container name advertised to peers.
    #[arg(long, default_value = "linkbroker")]
    pub container: String,

    /// Close connections that stay silent for this many seconds.
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Messages fetched from storage per send attempt.
    #[arg(long, default_value_t = 10)]
    pub fetch_limit: usize,

    /// Largest frame accepted or produced, in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    pub max_frame_length: usize,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_match_broker_defaults() {
        let cli = Cli::parse_from(["linkbroker"]);
        assert_eq!(cli.bind, "amqp://127.0.0.1:8888");
        assert_eq!(cli.container, "linkbroker");
        assert_eq!(cli.idle_timeout, None);
        assert_eq!(cli.fetch_limit, 10);
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_all_options() {
        let cli = Cli::parse_from([
            "linkbroker",
            "--bind",
            "amqp://0.0.0.0:5672",
            "--container",
            "edge",
            "--idle-timeout",
            "30",
            "--fetch-limit",
            "5",
            "--max-frame-length",
            "4096",
            "-v",
        ]);
        assert_eq!(cli.bind, "amqp://0.0.0.0:5672");
        assert_eq!(cli.container, "edge");
        assert_eq!(cli.idle_timeout, Some(30));
        assert_eq!(cli.fetch_limit, 5);
        assert_eq!(cli.max_frame_length, 4096);
        assert!(cli.verbose);
    }
}
