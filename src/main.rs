mod bot;
mod command;
mod config;
mod cooldown;
mod economy;
mod error;
mod helpers;
mod message;
mod player;
mod store;
mod stream;
mod token;
mod twitch;
mod webhook;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::Bot;
use config::{Config, SETTINGS_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if std::env::args().any(|arg| arg == "--setup") {
        if Config::write_default(SETTINGS_FILE)? {
            info!("fill in the [twitch] section of {SETTINGS_FILE} and start the bot again");
        }
        return Ok(());
    }

    // Run bot
    info!("starting bot");
    let mut bot = Bot::initialize().await?;
    bot.run().await;

    Ok(())
}
