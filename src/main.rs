//! `linkbroker` binary: parse flags, install logging and serve forever.

mod cli;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use linkbroker::{config::BrokerConfig, engine::FrameContainer, router::MemoryStore, server};
use tracing::Level;

fn config_from(cli: cli::Cli) -> BrokerConfig {
    BrokerConfig {
        bind: cli.bind,
        container: cli.container,
        idle_timeout: cli.idle_timeout.map(Duration::from_secs),
        fetch_limit: cli.fetch_limit,
        max_frame_length: cli.max_frame_length,
        ..BrokerConfig::default()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = config_from(cli);
    let container = FrameContainer::new(config.container.clone());
    match server::run(&config, container, MemoryStore::new()).await {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!(error = %e, bind = %config.bind, "broker failed to start");
            ExitCode::FAILURE
        }
    }
}
