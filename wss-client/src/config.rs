use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Skins are fetched from `<image_server_url><player>.png`.
pub const DEFAULT_IMAGE_SERVER_URL: &str = "http://s3.amazonaws.com/MinecraftSkins/";

/// Client configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Websocket address of the plugin, e.g. `ws://localhost:25564`
    /// Env: WSS_ADDRESS (required)
    pub address: String,

    /// Refuse addresses this build cannot connect to
    /// Env: WSS_WEBSOCKET_CHECK (default: true)
    pub websocket_check: bool,

    /// Gap between the end of one ping and the start of the next
    /// Env: WSS_PING_INTERVAL_MS (default: 15000)
    pub ping_interval: Duration,

    /// Gap between player list refreshes
    /// Env: WSS_ONLINE_INTERVAL_MS (default: 15000)
    pub online_interval: Duration,

    /// Log every raw reply
    /// Env: WSS_DEBUG (default: false)
    pub debug: bool,

    /// Env: WSS_IMAGE_SERVER_URL (default: Amazon skin bucket)
    pub image_server_url: String,

    /// Skip the image server and always draw the default skin
    /// Env: WSS_FORCE_DEFAULT_SKIN (default: false)
    pub force_default_skin: bool,

    /// Custom default skin, as a `data:` URI or a file path
    /// Env: WSS_DEFAULT_SKIN (default: embedded skin)
    pub default_skin: Option<String>,

    /// Smooth scaled faces instead of keeping them pixelated
    /// Env: WSS_IMAGE_SMOOTHING (default: true)
    pub image_smoothing: bool,

    /// Env: WSS_DISABLE_VERSION_WARNING (default: false)
    pub disable_version_warning: bool,

    /// Bridge backend whose time and server info win
    /// Env: WSS_LOBBY (optional)
    pub lobby: Option<String>,

    /// Draw a placeholder face while skins load
    /// Env: WSS_SHOW_LOADING_PLACEHOLDER (default: true)
    pub show_loading_placeholder: bool,

    /// Origin sent with CORS skin requests
    /// Env: WSS_ORIGIN (default: "http://localhost")
    pub origin: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            address: env_or_default_string("WSS_ADDRESS", ""),
            websocket_check: env_or_default("WSS_WEBSOCKET_CHECK", true),
            ping_interval: Duration::from_millis(env_or_default("WSS_PING_INTERVAL_MS", 15000)),
            online_interval: Duration::from_millis(env_or_default("WSS_ONLINE_INTERVAL_MS", 15000)),
            debug: env_or_default("WSS_DEBUG", false),
            image_server_url: env_or_default_string("WSS_IMAGE_SERVER_URL", DEFAULT_IMAGE_SERVER_URL),
            force_default_skin: env_or_default("WSS_FORCE_DEFAULT_SKIN", false),
            default_skin: var("WSS_DEFAULT_SKIN").ok().filter(|s| !s.is_empty()),
            image_smoothing: env_or_default("WSS_IMAGE_SMOOTHING", true),
            disable_version_warning: env_or_default("WSS_DISABLE_VERSION_WARNING", false),
            lobby: var("WSS_LOBBY").ok().filter(|s| !s.is_empty()),
            show_loading_placeholder: env_or_default("WSS_SHOW_LOADING_PLACEHOLDER", true),
            origin: env_or_default_string("WSS_ORIGIN", "http://localhost"),
        }
    }

    /// Configuration with default values for the given address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            websocket_check: true,
            ping_interval: Duration::from_millis(15000),
            online_interval: Duration::from_millis(15000),
            debug: false,
            image_server_url: DEFAULT_IMAGE_SERVER_URL.to_string(),
            force_default_skin: false,
            default_skin: None,
            image_smoothing: true,
            disable_version_warning: false,
            lobby: None,
            show_loading_placeholder: true,
            origin: "http://localhost".to_string(),
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
