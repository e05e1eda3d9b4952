//! Stream handlers wiring aggregates to the binder and user callbacks.

use std::sync::Arc;

use tracing::{debug, warn};
use wss_protocol::{AggregateResult, BackendReply};

use crate::binder::Binder;
use crate::scheduler::{CycleHandler, Disposition};
use crate::skin::SkinSource;
use crate::template::ListKind;
use crate::transport::SessionOutcome;

/// Per-reply callback. Returning [`Disposition::Suppress`] keeps the reply's
/// records out of the rendered aggregate.
pub type ReplyCallback = Arc<dyn Fn(&BackendReply) -> Disposition + Send + Sync>;

/// Callbacks for the ping stream.
#[derive(Clone, Default)]
pub struct PingOptions {
    pub on_connected: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_disconnected: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Receives the lobby's game time in ticks.
    pub on_server_time: Option<Arc<dyn Fn(i64) + Send + Sync>>,
    /// Overrides the configured ping interval.
    pub interval: Option<std::time::Duration>,
}

fn consult(callback: &Option<ReplyCallback>, reply: &BackendReply) -> Disposition {
    callback
        .as_ref()
        .map_or(Disposition::Render, |callback| callback(reply))
}

pub(crate) struct PingHandler<S> {
    pub(crate) binder: Arc<Binder<S>>,
    pub(crate) options: PingOptions,
}

impl<S: SkinSource> CycleHandler for PingHandler<S> {
    fn on_complete(&self, outcome: &SessionOutcome, result: &AggregateResult) {
        self.binder.page().set_online(outcome.opened);

        let callback = if outcome.opened {
            &self.options.on_connected
        } else {
            &self.options.on_disconnected
        };
        if let Some(callback) = callback {
            callback();
        }

        if let (Some(callback), Some(time)) = (&self.options.on_server_time, result.summary.lobby_time) {
            callback(time);
        }
    }
}

pub(crate) struct InfoHandler<S> {
    pub(crate) binder: Arc<Binder<S>>,
    pub(crate) callback: Option<ReplyCallback>,
}

impl<S: SkinSource> CycleHandler for InfoHandler<S> {
    fn on_reply(&self, reply: &BackendReply) -> Disposition {
        consult(&self.callback, reply)
    }

    fn on_complete(&self, _outcome: &SessionOutcome, result: &AggregateResult) {
        match &result.server {
            Some(info) => self.binder.bind_server_info(info, result.summary.lobby_time),
            None => debug!(status = ?result.status, "no server info in reply"),
        }
    }
}

/// Renders one list kind from every aggregate, empty or not.
pub(crate) struct ListHandler<S> {
    pub(crate) binder: Arc<Binder<S>>,
    pub(crate) list: ListKind,
    pub(crate) callback: Option<ReplyCallback>,
}

impl<S: SkinSource> CycleHandler for ListHandler<S> {
    fn on_reply(&self, reply: &BackendReply) -> Disposition {
        consult(&self.callback, reply)
    }

    fn on_complete(&self, outcome: &SessionOutcome, result: &AggregateResult) {
        if let Some(error) = &outcome.error {
            warn!(list = self.list.container_class(), %error, "refreshing with what arrived");
        }

        match self.list {
            ListKind::Plugins => self.binder.bind_plugins(&result.plugins),
            ListKind::PlayerProfile => {
                let player: Vec<_> = result.player.iter().cloned().collect();
                self.binder.bind_players(self.list, &player);
            }
            list => {
                let records = match list {
                    ListKind::Whitelist => &result.whitelist,
                    ListKind::OfflinePlayers => &result.offline_players,
                    _ => &result.players,
                };
                if result.is_successful() {
                    self.binder.bind_counts(list, &result.summary, records.len());
                }
                self.binder.bind_players(list, records);
            }
        }
    }
}
