mod command_handler;
mod config;
mod database;
mod link_service;
mod minecraft;
mod platform;

use std::{env, panic, process, sync::Arc};

use command_handler::CommandHandler;
use config::ConfigHandle;
use database::LinkStore;
use dotenv::dotenv;
use link_service::LinkService;
use minecraft::{Console, RconClient};
use platform::discord::Discord;
use platform::ChatPlatform;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_LINKED_ACCOUNTS_PATH: &str = "data/linkedAccounts.json";

#[tokio::main]
async fn main() {
    if let Err(e) = dotenv() {
        println!("{:?}", e);
        println!(".env file missing, using env variables")
    }

    tracing_subscriber::fmt::init();

    panic::set_hook(Box::new(|info| {
        tracing::error!("Unhandled panic: {}", info);
    }));

    let config = ConfigHandle::load(
        env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned()),
    );
    let store = LinkStore::new(
        env::var("LINKED_ACCOUNTS_PATH")
            .unwrap_or_else(|_| DEFAULT_LINKED_ACCOUNTS_PATH.to_owned()),
    );

    let console: Arc<dyn Console> = Arc::new(RconClient::new(config.clone()));
    let link_service = Arc::new(LinkService::new(store, console.clone()));
    let command_handler = CommandHandler::new(link_service, console, config);

    let discord = match Discord::init(command_handler).await {
        Ok(discord) => discord,
        Err(e) => {
            tracing::error!("Error loading Discord: {}. Is DISCORD_TOKEN set?", e);
            process::exit(1);
        }
    };

    if let Err(e) = discord.run().await {
        tracing::error!("Discord error: {:#}", e);
        process::exit(1);
    }
}
