use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use wss_client::config::Config;
use wss_client::{Client, ListKind, MemoryPage, PingOptions};

/// Canvas size used for faces on the logging page.
const FACE_SIZE: (u32, u32) = (32, 32);

const PLAYER_LIST: &str = r#"<ul class="wssMinecraftPlayerList"><li class="wssListItemTemplate"><span>#wssPlayerFace# #wssPlayerName# [#wssPlayerEnvironment#] #wssPlayerOnlineTime#<b class="wssPlayerIsOperator"> (op)</b></span></li><li class="wssEmptyListTemplate">No players online</li></ul>"#;
const WHITE_LIST: &str = r#"<ul class="wssMinecraftWhiteList"><li class="wssListItemTemplate"><span>#wssPlayerName# #wssPlayerOnlineTime#</span></li><li class="wssEmptyListTemplate">Whitelist is empty</li></ul>"#;
const PLUGIN_LIST: &str = r#"<ul class="wssMinecraftPluginList"><li class="wssListItemTemplate"><span>#wssPluginName# #wssPluginVersion# by #wssPluginAuthor#</span></li><li class="wssEmptyListTemplate">No plugins</li></ul>"#;
const PLAYER_PROFILE: &str = r#"<div class="wssMinecraftPlayer"><div class="wssListItemTemplate"><span>#wssPlayerFace# #wssPlayerName# level #wssPlayerLevel#, health #wssPlayerHealth# #wssPlayerOnlineTime#</span></div><div class="wssEmptyListTemplate">Unknown player</div></div>"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting WebSocketServices client...");

    // Load configuration from environment variables or use defaults
    let config = Config::from_env();
    tracing::info!(
        "Configuration: address={}, ping={}ms, online={}ms, image_server={}, lobby={:?}",
        config.address,
        config.ping_interval.as_millis(),
        config.online_interval.as_millis(),
        config.image_server_url,
        config.lobby
    );
    let player = std::env::var("WSS_PLAYER").ok().filter(|name| !name.is_empty());

    let page = Arc::new(
        MemoryPage::new(FACE_SIZE)
            .with_template(ListKind::Players, PLAYER_LIST)
            .with_template(ListKind::Whitelist, WHITE_LIST)
            .with_template(ListKind::Plugins, PLUGIN_LIST)
            .with_template(ListKind::PlayerProfile, PLAYER_PROFILE),
    );
    let client = Client::connect(config, page).context("failed to create client")?;

    client
        .ping(PingOptions {
            on_server_time: Some(Arc::new(|time: i64| {
                tracing::debug!(time, "server time");
            })),
            ..Default::default()
        })
        .await;
    client.server_info(None).await;
    client.who(None).await;
    client.whitelist(None).await;
    client.plugins(None).await;
    if let Some(name) = player {
        client
            .player(&name, None)
            .await
            .context("invalid WSS_PLAYER")?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down...");
    client.stop_all().await;
    Ok(())
}
