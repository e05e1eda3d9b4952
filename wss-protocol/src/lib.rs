mod command;
mod error;
mod models;
mod reply;

pub use command::{Command, Request};
pub use error::{ProtocolError, Result};
pub use models::{
  AggregateResult, AggregateStatus, BackendReply, BackendStatus, Environment, PlayerName,
  PlayerRecord, PluginRecord, Presence, ReplyStatus, SUCCESS_SENTINEL, ServerInfo, Summary,
  VersionMismatch,
};
pub use reply::parse_reply;

use models::RawPlayer;
use serde_json::Value;
use tracing::{debug, warn};

/// Plugin version this client was written against.
pub const PROTOCOL_VERSION: &str = "1.1.5";

/// Merges every message buffered during one session into an [`AggregateResult`].
#[derive(Debug, Clone)]
pub struct Aggregator {
  client_version: String,
  lobby: Option<String>,
  warn_on_version_mismatch: bool,
}

impl Default for Aggregator {
  fn default() -> Self {
    Self::new()
  }
}

impl Aggregator {
  pub fn new() -> Self {
    Self {
      client_version: PROTOCOL_VERSION.to_string(),
      lobby: None,
      warn_on_version_mismatch: true,
    }
  }

  /// Backend whose time and server info are preferred over the first one seen.
  pub fn with_lobby(mut self, lobby: Option<String>) -> Self {
    self.lobby = lobby.filter(|name| !name.is_empty());
    self
  }

  pub fn with_version_warnings(mut self, enabled: bool) -> Self {
    self.warn_on_version_mismatch = enabled;
    self
  }

  pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
    self.client_version = version.into();
    self
  }

  /// Aggregate without vetoing any reply.
  pub fn aggregate(&self, messages: &[String]) -> AggregateResult {
    self.aggregate_with(messages, |_| true)
  }

  /// Aggregate, asking `keep` about every successful reply. Replies it
  /// rejects are listed in the diagnostics but contribute no records.
  pub fn aggregate_with<F>(&self, messages: &[String], mut keep: F) -> AggregateResult
  where
    F: FnMut(&BackendReply) -> bool,
  {
    let mut result = AggregateResult::default();
    let mut saw_reply = false;
    let mut lobby_time: Option<i64> = None;
    let mut first_time: Option<i64> = None;

    for raw in messages {
      let reply = match parse_reply(raw) {
        Ok(reply) => reply,
        Err(e) => {
          warn!(error = %e, "dropping unparseable reply");
          result.parse_failures += 1;
          continue;
        }
      };
      saw_reply = true;

      let contributed = reply.status.is_successful() && keep(&reply);
      result.backends.push(BackendStatus {
        backend: reply.backend.clone(),
        status: reply.status.clone(),
        contributed,
      });

      if !contributed {
        debug!(backend = %reply.backend, status = ?reply.status, "reply excluded from aggregate");
        continue;
      }
      result.status = AggregateStatus::Successful;

      self.check_version(&reply, &mut result);

      if let Some(max) = reply.max_players() {
        result.summary.max_players = Some(result.summary.max_players.map_or(max, |m| m.max(max)));
      }

      if let Some(time) = reply.server_time() {
        if first_time.is_none() {
          first_time = Some(time);
        }
        if self.is_lobby(&reply.backend) {
          lobby_time = Some(time);
        }
      }

      self.merge_records(&reply, &mut result);
    }

    if result.status != AggregateStatus::Successful && saw_reply {
      result.status = AggregateStatus::Failed;
    }
    result.summary.total_online = result.players.len();
    result.summary.lobby_time = lobby_time.or(first_time);
    result
  }

  fn is_lobby(&self, backend: &str) -> bool {
    self.lobby.as_deref() == Some(backend)
  }

  fn check_version(&self, reply: &BackendReply, result: &mut AggregateResult) {
    let Some(reported) = reply.version.as_deref() else {
      return;
    };
    if reported == self.client_version {
      return;
    }

    result.version_mismatches.push(VersionMismatch {
      backend: reply.backend.clone(),
      reported: reported.to_string(),
    });

    if self.warn_on_version_mismatch {
      let source = if reply.is_bridged() {
        reply.backend.as_str()
      } else {
        "client"
      };
      warn!(
        source,
        plugin = reported,
        client = %self.client_version,
        "version mismatch"
      );
    }
  }

  fn merge_records(&self, reply: &BackendReply, result: &mut AggregateResult) {
    let backend = reply.backend.as_str();
    let payload = &reply.payload;

    result
      .players
      .extend(players_in(payload, "Players").map(|p| p.into_record(backend)));
    result
      .whitelist
      .extend(players_in(payload, "Whitelist").map(|p| p.into_record(backend)));
    result
      .offline_players
      .extend(players_in(payload, "OfflinePlayers").map(|p| p.into_record(backend)));

    if let Some(plugins) = payload.get("Plugins").and_then(Value::as_array) {
      for entry in plugins {
        match serde_json::from_value::<PluginRecord>(entry.clone()) {
          Ok(mut plugin) => {
            plugin.backend = backend.to_string();
            result.plugins.push(plugin);
          }
          Err(e) => warn!(backend, error = %e, "skipping malformed plugin entry"),
        }
      }
    }

    if result.player.is_none() {
      if let Some(entry) = payload.get("Player") {
        match serde_json::from_value::<RawPlayer>(entry.clone()) {
          Ok(raw) => result.player = Some(raw.into_record(backend)),
          Err(e) => warn!(backend, error = %e, "skipping malformed player entry"),
        }
      }
    }

    let is_info = payload.get("bukkitVersion").is_some() || payload.get("motd").is_some();
    let prefer = result.server.is_none() || self.is_lobby(backend);
    if is_info && prefer {
      match serde_json::from_value::<ServerInfo>(payload.clone()) {
        Ok(mut info) => {
          info.backend = backend.to_string();
          result.server = Some(info);
        }
        Err(e) => warn!(backend, error = %e, "skipping malformed server info"),
      }
    }
  }
}

/// Player entries under `key`, skipping (and logging) malformed ones.
fn players_in<'a>(payload: &'a Value, key: &'a str) -> impl Iterator<Item = RawPlayer> + 'a {
  payload
    .get(key)
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(move |entry| match serde_json::from_value::<RawPlayer>(entry.clone()) {
      Ok(raw) => Some(raw),
      Err(e) => {
        warn!(list = key, error = %e, "skipping malformed player entry");
        None
      }
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

  fn who(players: &[&str], max: u32) -> Value {
    let players: Vec<Value> = players
      .iter()
      .map(|name| json!({ "name": name, "onlineTime": "0d 0h 1m 0s", "environment": "NORMAL", "isOperator": false }))
      .collect();
    json!({ "Status": "SUCCESSFUL", "MaxPlayers": max, "Players": players })
  }

  fn bridged(backend: &str, inner: Value) -> String {
    json!({ "wssb": true, "serverName": backend, "serverInfo": inner }).to_string()
  }

  fn names(records: &[PlayerRecord]) -> Vec<&str> {
    records.iter().map(|p| p.name.as_str()).collect()
  }

  #[test]
  fn test_two_backends_merge_without_loss() {
    let messages = vec![
      bridged("lobby", who(&["Steve", "Alex"], 20)),
      bridged("survival", who(&["Notch", "jeb_"], 50)),
    ];
    let result = Aggregator::new().aggregate(&messages);

    assert!(result.is_successful());
    assert_eq!(result.players.len(), 4);
    assert_eq!(result.summary.total_online, 4);
    assert_eq!(result.summary.max_players, Some(50));
    assert_eq!(result.players[2].backend, "survival");
  }

  #[test]
  fn test_bridge_and_plain_replies_match() {
    let plain = vec![who(&["Steve", "Alex"], 20).to_string()];
    let wrapped = vec![bridged("lobby", who(&["Steve", "Alex"], 20))];

    let aggregator = Aggregator::new();
    let plain = aggregator.aggregate(&plain);
    let wrapped = aggregator.aggregate(&wrapped);

    let untagged: Vec<PlayerRecord> = wrapped
      .players
      .iter()
      .cloned()
      .map(|mut p| {
        p.backend.clear();
        p
      })
      .collect();
    assert_eq!(plain.players, untagged);
  }

  #[test]
  fn test_failed_reply_is_excluded() {
    let messages = vec![
      json!({ "Status": "FAILED" }).to_string(),
      json!({ "Status": "SUCCESSFUL", "Players": [{ "name": "Alice", "onlineTime": 120 }] })
        .to_string(),
    ];
    let result = Aggregator::new().aggregate(&messages);

    assert_eq!(names(&result.players), vec!["Alice"]);
    assert_eq!(result.backends.len(), 2);
    assert!(!result.backends[0].contributed);
    assert!(result.backends[1].contributed);
  }

  #[test]
  fn test_parse_failure_does_not_abort_batch() {
    let messages = vec![
      "{broken".to_string(),
      who(&["Steve"], 10).to_string(),
    ];
    let result = Aggregator::new().aggregate(&messages);

    assert_eq!(result.parse_failures, 1);
    assert_eq!(names(&result.players), vec!["Steve"]);
  }

  #[test]
  fn test_status_without_success() {
    let failed = Aggregator::new().aggregate(&[json!({ "Status": "FAILED" }).to_string()]);
    assert_eq!(failed.status, AggregateStatus::Failed);

    let empty = Aggregator::new().aggregate(&[]);
    assert_eq!(empty.status, AggregateStatus::Empty);
    assert!(empty.players.is_empty());
  }

  #[test]
  fn test_lobby_time_selection() {
    let messages = vec![
      bridged("survival", json!({ "Status": "SUCCESSFUL", "serverTime": 1000 })),
      bridged("lobby", json!({ "Status": "SUCCESSFUL", "serverTime": 14000 })),
    ];

    let default = Aggregator::new().aggregate(&messages);
    assert_eq!(default.summary.lobby_time, Some(1000));

    let lobby = Aggregator::new()
      .with_lobby(Some("lobby".to_string()))
      .aggregate(&messages);
    assert_eq!(lobby.summary.lobby_time, Some(14000));
  }

  #[test]
  fn test_lobby_server_info_wins() {
    let info = |motd: &str| json!({ "Status": "SUCCESSFUL", "bukkitVersion": "1.4.7-R1.0", "motd": motd });
    let messages = vec![
      bridged("survival", info("Survival")),
      bridged("lobby", info("Lobby")),
      bridged("creative", info("Creative")),
    ];

    let first = Aggregator::new().aggregate(&messages).server.unwrap();
    assert_eq!(first.backend, "survival");
    assert_eq!(first.motd, "Survival");

    let lobby = Aggregator::new()
      .with_lobby(Some("lobby".to_string()))
      .aggregate(&messages)
      .server
      .unwrap();
    assert_eq!(lobby.backend, "lobby");
    assert_eq!(lobby.motd, "Lobby");
  }

  #[test]
  fn test_veto_excludes_reply_records() {
    let messages = vec![
      bridged("lobby", who(&["Steve"], 20)),
      bridged("hidden", who(&["Herobrine"], 20)),
    ];
    let result = Aggregator::new().aggregate_with(&messages, |reply| reply.backend != "hidden");

    assert_eq!(names(&result.players), vec!["Steve"]);
    assert!(!result.backends[1].contributed);
  }

  #[test]
  fn test_version_mismatch_recorded() {
    let messages = vec![
      json!({ "Status": "SUCCESSFUL", "pong": "alive", "wssVersion": "1.0.0" }).to_string(),
      bridged("lobby", json!({ "Status": "SUCCESSFUL", "wssVersion": PROTOCOL_VERSION })),
    ];
    let result = Aggregator::new().aggregate(&messages);

    assert_eq!(result.version_mismatches.len(), 1);
    assert_eq!(result.version_mismatches[0].backend, "");
    assert_eq!(result.version_mismatches[0].reported, "1.0.0");
  }

  /// Counts WARN events seen while installed.
  struct WarnCounter(Arc<AtomicUsize>);

  impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
      if *event.metadata().level() == tracing::Level::WARN {
        self.0.fetch_add(1, Ordering::SeqCst);
      }
    }
  }

  fn count_warnings(aggregator: &Aggregator, messages: &[String]) -> usize {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&count)));
    tracing::subscriber::with_default(subscriber, || aggregator.aggregate(messages));
    count.load(Ordering::SeqCst)
  }

  #[test]
  fn test_version_warning_can_be_disabled() {
    let messages = vec![json!({ "Status": "SUCCESSFUL", "wssVersion": "1.0.0" }).to_string()];

    assert_eq!(count_warnings(&Aggregator::new(), &messages), 1);

    let quiet = Aggregator::new().with_version_warnings(false);
    assert_eq!(count_warnings(&quiet, &messages), 0);
    assert_eq!(quiet.aggregate(&messages).version_mismatches.len(), 1);
  }

  #[test]
  fn test_server_info_and_player_details() {
    let messages = vec![
      json!({
        "Status": "SUCCESSFUL",
        "serverName": "Test Server",
        "name": "CraftBukkit",
        "bukkitVersion": "1.4.7-R1.0",
        "motd": "Welcome",
        "port": 25565,
        "serverTime": 6000
      })
      .to_string(),
      json!({
        "Status": "SUCCESSFUL",
        "Player": { "name": "Steve", "health": 20.0, "level": 3, "experience": 0.5 }
      })
      .to_string(),
    ];
    let result = Aggregator::new().aggregate(&messages);

    let server = result.server.unwrap();
    assert_eq!(server.server_name, "Test Server");
    assert_eq!(server.port, Some(25565));
    let player = result.player.unwrap();
    assert_eq!(player.name, "Steve");
    assert_eq!(player.level, Some(3));
    assert_eq!(player.health, Some(20.0));
  }

  #[test]
  fn test_whitelist_offline_and_plugins() {
    let messages = vec![
      json!({
        "Status": "SUCCESSFUL",
        "Whitelist": [{ "name": "Alex", "isOnline": false, "lastPlayed": "Never" }],
        "OfflinePlayers": [{ "name": "Notch", "isOnline": false, "lastPlayed": "2d 0h 0m 0s" }],
        "Plugins": [{ "name": "WebSocketServices", "version": "1.1.5", "author": "[CaffeinatedRat]", "description": "none" }]
      })
      .to_string(),
    ];
    let result = Aggregator::new().aggregate(&messages);

    assert_eq!(names(&result.whitelist), vec!["Alex"]);
    assert_eq!(names(&result.offline_players), vec!["Notch"]);
    assert_eq!(result.plugins.len(), 1);
    assert_eq!(result.plugins[0].name, "WebSocketServices");
    assert_eq!(result.summary.total_online, 0);
  }
}
