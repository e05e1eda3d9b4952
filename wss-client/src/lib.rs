pub mod binder;
pub mod config;
mod error;
mod handlers;
pub mod helpers;
pub mod markup;
pub mod page;
pub mod scheduler;
pub mod skin;
pub mod template;
pub mod transport;
mod validation;

pub use binder::Binder;
pub use config::Config;
pub use error::{ClientError, Result, TransportError};
pub use handlers::{PingOptions, ReplyCallback};
pub use page::{MemoryPage, Page};
pub use scheduler::{CycleHandler, Disposition, PollStream};
pub use skin::{FetchMode, HttpSkinSource, SkinCacheEntry, SkinError, SkinResolver, SkinSource};
pub use template::{ListKind, Template};
pub use transport::{Connector, SessionOutcome, WsConnector};
pub use validation::{ValidationError, player_name};
pub use wss_protocol as protocol;

use std::sync::Arc;
use std::time::Duration;

use tokio_tungstenite::tungstenite::http::Uri;
use tracing::{debug, info};
use wss_protocol::{Aggregator, Command, Request};

use handlers::{InfoHandler, ListHandler, PingHandler};

struct Inner<C, S> {
    config: Config,
    connector: Arc<C>,
    aggregator: Arc<Aggregator>,
    streams: scc::HashMap<String, Arc<PollStream<C>>>,
    binder: Arc<Binder<S>>,
}

/// Status client for one WebSocketServices endpoint.
///
/// Owns every poll stream, the captured templates, the skin cache and the
/// canvas counter. Cloning shares them.
pub struct Client<C = WsConnector, S = HttpSkinSource> {
    inner: Arc<Inner<C, S>>,
}

impl<C, S> Clone for Client<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client {
    /// Client over a real websocket and the configured image server.
    pub fn connect(config: Config, page: Arc<dyn Page>) -> Result<Self> {
        let source = HttpSkinSource::new(config.origin.clone());
        Self::with_parts(config, WsConnector, source, page)
    }
}

impl<C: Connector, S: SkinSource> Client<C, S> {
    pub fn with_parts(config: Config, connector: C, source: S, page: Arc<dyn Page>) -> Result<Self> {
        check_address(&config)?;
        let skins = SkinResolver::new(source, &config).map_err(ClientError::DefaultSkin)?;
        let aggregator = Aggregator::new()
            .with_lobby(config.lobby.clone())
            .with_version_warnings(!config.disable_version_warning);
        info!(address = %config.address, "client ready");

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                connector: Arc::new(connector),
                aggregator: Arc::new(aggregator),
                streams: scc::HashMap::new(),
                binder: Arc::new(Binder::new(page, Arc::new(skins))),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn binder(&self) -> &Arc<Binder<S>> {
        &self.inner.binder
    }

    /// Keep-alive ping driving the online indicator.
    pub async fn ping(&self, options: PingOptions) -> String {
        let interval = options.interval.unwrap_or(self.inner.config.ping_interval);
        let handler = PingHandler {
            binder: Arc::clone(&self.inner.binder),
            options,
        };
        self.start(Command::Ping, interval, Arc::new(handler)).await
    }

    /// One-shot server info.
    pub async fn server_info(&self, callback: Option<ReplyCallback>) -> String {
        let handler = InfoHandler {
            binder: Arc::clone(&self.inner.binder),
            callback,
        };
        self.start(Command::Info, Duration::ZERO, Arc::new(handler)).await
    }

    /// Online players, refreshed every online interval.
    pub async fn who(&self, callback: Option<ReplyCallback>) -> String {
        let interval = self.inner.config.online_interval;
        self.start_list(Command::Who, ListKind::Players, interval, callback)
            .await
    }

    pub async fn whitelist(&self, callback: Option<ReplyCallback>) -> String {
        self.start_list(Command::Whitelist, ListKind::Whitelist, Duration::ZERO, callback)
            .await
    }

    pub async fn offline_players(&self, callback: Option<ReplyCallback>) -> String {
        self.start_list(
            Command::OfflinePlayers,
            ListKind::OfflinePlayers,
            Duration::ZERO,
            callback,
        )
        .await
    }

    pub async fn plugins(&self, callback: Option<ReplyCallback>) -> String {
        self.start_list(Command::Plugins, ListKind::Plugins, Duration::ZERO, callback)
            .await
    }

    /// Details for one player, refreshed every online interval.
    pub async fn player(&self, name: &str, callback: Option<ReplyCallback>) -> Result<String> {
        player_name(name)?;
        let interval = self.inner.config.online_interval;
        Ok(self
            .start_list(
                Command::Player(name.to_string()),
                ListKind::PlayerProfile,
                interval,
                callback,
            )
            .await)
    }

    /// Start or restart the stream for `request`. Returns its key.
    pub async fn start(
        &self,
        request: impl Into<Request>,
        interval: Duration,
        handler: Arc<dyn CycleHandler>,
    ) -> String {
        let request = request.into();
        let key = request.stream_key();
        let stream = self.stream(&key).await;
        stream.start(request.to_payload(), interval, handler);
        key
    }

    /// Stop one stream. Returns false for unknown keys.
    pub async fn stop(&self, key: &str) -> bool {
        match self.stream_handle(key).await {
            Some(stream) => {
                stream.stop();
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        self.inner
            .streams
            .retain_async(|_, stream| {
                stream.stop();
                true
            })
            .await;
        debug!("all streams stopped");
    }

    pub async fn stream_handle(&self, key: &str) -> Option<Arc<PollStream<C>>> {
        self.inner
            .streams
            .read_async(key, |_, stream| Arc::clone(stream))
            .await
    }

    async fn start_list(
        &self,
        command: Command,
        list: ListKind,
        interval: Duration,
        callback: Option<ReplyCallback>,
    ) -> String {
        let handler = ListHandler {
            binder: Arc::clone(&self.inner.binder),
            list,
            callback,
        };
        self.start(command, interval, Arc::new(handler)).await
    }

    async fn stream(&self, key: &str) -> Arc<PollStream<C>> {
        if let Some(stream) = self.stream_handle(key).await {
            return stream;
        }

        let fresh = PollStream::new(
            key,
            self.inner.config.address.clone(),
            Arc::clone(&self.inner.connector),
            Arc::clone(&self.inner.aggregator),
            self.inner.config.debug,
        );
        match self
            .inner
            .streams
            .insert_async(key.to_string(), Arc::clone(&fresh))
            .await
        {
            Ok(()) => fresh,
            // Lost a race with a concurrent start of the same key.
            Err(_) => self.stream_handle(key).await.unwrap_or(fresh),
        }
    }
}

fn check_address(config: &Config) -> Result<()> {
    let address = config.address.trim();
    if address.is_empty() {
        return Err(ClientError::InvalidAddress(
            "no websocket address configured".to_string(),
        ));
    }

    let uri: Uri = address
        .parse()
        .map_err(|e| ClientError::InvalidAddress(format!("{address}: {e}")))?;
    let (Some(scheme), Some(_host)) = (uri.scheme_str(), uri.host()) else {
        return Err(ClientError::InvalidAddress(format!(
            "{address}: expected scheme://host[:port]"
        )));
    };

    if config.websocket_check && !is_supported_scheme(scheme) {
        return Err(ClientError::NotSupported {
            scheme: scheme.to_string(),
        });
    }
    Ok(())
}

fn is_supported_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("ws") || (cfg!(feature = "tls") && scheme.eq_ignore_ascii_case("wss"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_checks() {
        assert!(check_address(&Config::new("ws://localhost:25564")).is_ok());
        assert!(matches!(
            check_address(&Config::new("")),
            Err(ClientError::InvalidAddress(_))
        ));
        assert!(matches!(
            check_address(&Config::new("not an address")),
            Err(ClientError::InvalidAddress(_))
        ));
        assert!(matches!(
            check_address(&Config::new("http://localhost:25564")),
            Err(ClientError::NotSupported { .. })
        ));
    }

    #[test]
    fn test_scheme_check_can_be_disabled() {
        let mut config = Config::new("http://localhost:25564");
        config.websocket_check = false;
        assert!(check_address(&config).is_ok());
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_secure_scheme_needs_tls_feature() {
        assert!(matches!(
            check_address(&Config::new("wss://example.com")),
            Err(ClientError::NotSupported { scheme }) if scheme == "wss"
        ));
    }
}
