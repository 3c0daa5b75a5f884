use anyhow::{Context, Result};
use clap::Parser;
use flip_detector::{
    broadcast::{self, AppState, RoomHub},
    cli::{Cli, Command},
    config::AppConfig,
    publisher::Publisher,
    scheduler::{ScheduleConfig, Scheduler},
    subscriber,
    upstream::PriceClient,
    utils,
};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    let shutdown = utils::shutdown_token();

    match cli.command {
        Command::Worker { server_url } => {
            if let Some(url) = server_url {
                config.server_url = url;
            }
            tracing::info!(server_url = %config.server_url, "[INIT] worker starting");

            let prices = PriceClient::new(&config.price_api_url, config.fetch_timeout)?;
            let publisher = Publisher::new(&config.server_url, config.publish_timeout)?;
            let scheduler = Scheduler::new(prices, publisher, ScheduleConfig::from(&config));
            scheduler.run(shutdown).await;
        }
        Command::Server { port } => {
            let port = port.unwrap_or(config.port);
            let hub = RoomHub::new(config.subscriber_buffer);
            let state = AppState::new(Arc::new(hub), shutdown);
            broadcast::serve(SocketAddr::from(([0, 0, 0, 0], port)), state).await?;
        }
        Command::Watch { server_url, rooms } => {
            let server_url = server_url.unwrap_or(config.server_url);
            let stream = subscriber::connect_and_stream(&server_url, &rooms).await?;
            tracing::info!(%server_url, ?rooms, "[INIT] watching");
            futures::pin_mut!(stream);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = stream.next() => {
                        let Some(event) = event else {
                            tracing::warn!("[SUB] server closed the connection");
                            break;
                        };
                        let data = serde_json::to_string(&event)?;
                        tracing::info!(event = event.name(), %data, "[SUB] event");
                    }
                }
            }
        }
    }

    Ok(())
}
