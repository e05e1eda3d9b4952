//! One transient websocket round trip: open, send one command, buffer every
//! reply until the server closes the connection.

use std::future::Future;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

use crate::error::TransportError;

/// What a finished session reports, exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Whether the connection was ever established.
    pub opened: bool,
    /// Text frames in arrival order.
    pub messages: Vec<String>,
    pub error: Option<TransportError>,
}

impl SessionOutcome {
    pub fn unopened(error: TransportError) -> Self {
        Self {
            opened: false,
            messages: Vec::new(),
            error: Some(error),
        }
    }

    pub fn closed(messages: Vec<String>) -> Self {
        Self {
            opened: true,
            messages,
            error: None,
        }
    }
}

/// Runs sessions against an address. Implementations never share state
/// between sessions and never retry.
pub trait Connector: Send + Sync + 'static {
    fn exchange(
        &self,
        address: &str,
        payload: &str,
    ) -> impl Future<Output = SessionOutcome> + Send;
}

/// Websocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    async fn exchange(&self, address: &str, payload: &str) -> SessionOutcome {
        let (ws_stream, _response) = match connect_async(address).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("WebSocket connection to {address} failed: {e}");
                return SessionOutcome::unopened(TransportError::Connect(e.to_string()));
            }
        };
        debug!(address, payload, "connection opened, sending command");

        let (mut write, read) = ws_stream.split();
        if let Err(e) = write.send(Message::Text(payload.into())).await {
            warn!("WebSocket send to {address} failed: {e}");
            return SessionOutcome {
                opened: true,
                messages: Vec::new(),
                error: Some(TransportError::Send(e.to_string())),
            };
        }

        let (messages, error) = collect_messages(read, address).await;
        if let Err(e) = write.close().await {
            debug!(address, error = %e, "close after session failed");
        }

        SessionOutcome {
            opened: true,
            messages,
            error,
        }
    }
}

/// Buffers text frames from any message stream until a close frame, the end
/// of the stream, or an error.
pub async fn collect_messages<St>(
    mut stream: St,
    address: &str,
) -> (Vec<String>, Option<TransportError>)
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut messages = Vec::new();
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => messages.push(text.to_string()),
            Ok(Message::Close(_)) => {
                debug!(address, count = messages.len(), "server closed session");
                break;
            }
            Err(WsError::ConnectionClosed) => break,
            Err(e) => {
                warn!("WebSocket error from {address}: {e}");
                return (messages, Some(TransportError::Read(e.to_string())));
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    (messages, None)
}
