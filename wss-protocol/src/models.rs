use arrayvec::ArrayString;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// Status sentinel carried by every successful reply.
pub const SUCCESS_SENTINEL: &str = "SUCCESSFUL";

/// Status of one reply as reported by the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
  Successful,
  /// Any other status text, e.g. "NOT AVAILABLE" or "FAILED".
  Other(String),
  /// The reply carried no status field at all.
  Missing,
}

impl ReplyStatus {
  pub fn from_text(text: &str) -> Self {
    if text == SUCCESS_SENTINEL {
      ReplyStatus::Successful
    } else {
      ReplyStatus::Other(text.to_string())
    }
  }

  pub fn is_successful(&self) -> bool {
    matches!(self, ReplyStatus::Successful)
  }
}

/// One parsed message from one backend server within a session.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
  /// Backend server name, empty when the reply did not come through a bridge.
  pub backend: String,
  pub status: ReplyStatus,
  /// Plugin version reported by the backend (`wssVersion`), if any.
  pub version: Option<String>,
  /// The unwrapped per-backend payload.
  pub payload: Value,
}

impl BackendReply {
  pub fn is_bridged(&self) -> bool {
    !self.backend.is_empty()
  }

  /// Game time in ticks, as reported by `ping` and `info`.
  pub fn server_time(&self) -> Option<i64> {
    self.payload.get("serverTime").and_then(Value::as_i64)
  }

  pub fn max_players(&self) -> Option<u32> {
    self
      .payload
      .get("MaxPlayers")
      .and_then(Value::as_u64)
      .and_then(|n| u32::try_from(n).ok())
  }
}

/// The world a player is currently in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
  #[default]
  Normal,
  Nether,
  TheEnd,
  Other(String),
}

impl Environment {
  /// Parses the server's environment name (`NORMAL`, `NETHER`, `THE_END`).
  pub fn parse(raw: &str) -> Self {
    match Self::normalize(raw).as_str() {
      "normal" => Environment::Normal,
      "nether" => Environment::Nether,
      "theend" => Environment::TheEnd,
      _ => Environment::Other(raw.to_string()),
    }
  }

  /// Tag used by templates, e.g. `theend` for `THE_END`.
  pub fn tag(&self) -> String {
    match self {
      Environment::Normal => "normal".to_string(),
      Environment::Nether => "nether".to_string(),
      Environment::TheEnd => "theend".to_string(),
      Environment::Other(raw) => Self::normalize(raw),
    }
  }

  fn normalize(raw: &str) -> String {
    raw.replace('_', "").to_lowercase()
  }
}

/// Whether a player is online, and for how long or since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
  /// `online_time` is the server-formatted duration, absent for list entries
  /// that only know the player is online.
  Online { online_time: Option<String> },
  /// `last_played` is the server-formatted duration, or "Never".
  Offline { last_played: String },
}

/// A normalized player entry from `who`, `whitelist`, `offlinePlayers` or `player`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
  pub name: String,
  pub is_operator: bool,
  pub presence: Presence,
  pub environment: Environment,
  /// Stable player identifier when the server reports one.
  pub id: Option<String>,
  pub health: Option<f64>,
  pub food_level: Option<f64>,
  pub experience: Option<f64>,
  pub level: Option<u32>,
  /// Backend the record came from (empty for single-backend replies).
  pub backend: String,
}

impl PlayerRecord {
  /// Text shown next to the player, e.g. "Online: 0d 1h 2m 3s".
  pub fn presence_text(&self) -> String {
    match &self.presence {
      Presence::Online {
        online_time: Some(time),
      } => format!("Online: {time}"),
      Presence::Online { online_time: None } => "Online: Now".to_string(),
      Presence::Offline { last_played } => format!("Last Played: {last_played}"),
    }
  }
}

/// Raw player entry as the plugin serializes it.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPlayer {
  #[serde(default)]
  name: Option<String>,
  #[serde(default, rename = "isOperator")]
  is_operator: bool,
  #[serde(default, rename = "isOnline")]
  is_online: Option<bool>,
  #[serde(default, rename = "onlineTime", deserialize_with = "scalar_text")]
  online_time: Option<String>,
  #[serde(default, rename = "lastPlayed", deserialize_with = "scalar_text")]
  last_played: Option<String>,
  #[serde(default)]
  environment: Option<String>,
  #[serde(default, alias = "id", deserialize_with = "scalar_text")]
  uuid: Option<String>,
  #[serde(default)]
  health: Option<f64>,
  #[serde(default, rename = "foodLevel")]
  food_level: Option<f64>,
  #[serde(default)]
  experience: Option<f64>,
  #[serde(default)]
  level: Option<u32>,
}

impl RawPlayer {
  pub(crate) fn into_record(self, backend: &str) -> PlayerRecord {
    let presence = match (self.online_time, self.is_online) {
      (Some(time), _) => Presence::Online {
        online_time: Some(time),
      },
      (None, Some(false)) => Presence::Offline {
        last_played: self.last_played.unwrap_or_else(|| "Never".to_string()),
      },
      (None, _) => Presence::Online { online_time: None },
    };

    PlayerRecord {
      name: self.name.unwrap_or_default(),
      is_operator: self.is_operator,
      presence,
      environment: self
        .environment
        .as_deref()
        .map(Environment::parse)
        .unwrap_or_default(),
      id: self.uuid,
      health: self.health,
      food_level: self.food_level,
      experience: self.experience,
      level: self.level,
      backend: backend.to_string(),
    }
  }
}

/// A plugin installed on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginRecord {
  #[serde(default)]
  pub name: String,
  #[serde(default, deserialize_with = "text_or_default")]
  pub version: String,
  #[serde(default, deserialize_with = "text_or_default")]
  pub author: String,
  #[serde(default, deserialize_with = "text_or_default")]
  pub description: String,
  #[serde(skip)]
  pub backend: String,
}

/// Reply to the `info` command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
  #[serde(default, rename = "serverName")]
  pub server_name: String,
  /// Server implementation name, e.g. "CraftBukkit".
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub version: String,
  #[serde(default, rename = "bukkitVersion")]
  pub bukkit_version: String,
  #[serde(default)]
  pub motd: String,
  #[serde(default, rename = "worldType")]
  pub world_type: String,
  #[serde(default, rename = "gameMode")]
  pub game_mode: String,
  #[serde(default, rename = "isWhiteListed")]
  pub is_white_listed: bool,
  #[serde(default, rename = "allowsNether")]
  pub allows_nether: bool,
  #[serde(default, rename = "allowsEnd")]
  pub allows_end: bool,
  #[serde(default, rename = "allowsFlight")]
  pub allows_flight: bool,
  #[serde(default)]
  pub port: Option<u16>,
  #[serde(default, rename = "ipAddress")]
  pub ip_address: String,
  #[serde(default, rename = "serverTime")]
  pub server_time: Option<i64>,
  #[serde(skip)]
  pub backend: String,
}

/// Outcome of a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateStatus {
  /// At least one backend answered successfully.
  Successful,
  /// Replies arrived, none successful.
  Failed,
  /// Nothing parseable arrived.
  #[default]
  Empty,
}

/// Scalar summary across contributing backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
  /// Maximum of `MaxPlayers` across backends.
  pub max_players: Option<u32>,
  /// Number of merged player records.
  pub total_online: usize,
  /// `serverTime` of the lobby backend, or of the first backend reporting one.
  pub lobby_time: Option<i64>,
}

/// Diagnostic view of one reply, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
  pub backend: String,
  pub status: ReplyStatus,
  /// False when the reply was successful but vetoed by the stream's callback.
  pub contributed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
  pub backend: String,
  pub reported: String,
}

/// Merged view of every reply in one session. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
  pub status: AggregateStatus,
  pub players: Vec<PlayerRecord>,
  pub whitelist: Vec<PlayerRecord>,
  pub offline_players: Vec<PlayerRecord>,
  pub plugins: Vec<PluginRecord>,
  /// Result of `player <name>`, first contributing backend wins.
  pub player: Option<PlayerRecord>,
  pub server: Option<ServerInfo>,
  pub summary: Summary,
  pub backends: Vec<BackendStatus>,
  pub version_mismatches: Vec<VersionMismatch>,
  pub parse_failures: usize,
}

impl AggregateResult {
  pub fn is_successful(&self) -> bool {
    self.status == AggregateStatus::Successful
  }
}

/// Accepts a string or a number and keeps its textual form.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::String(s)) => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    Some(Value::Bool(b)) => Some(b.to_string()),
    _ => None,
  })
}

fn text_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(scalar_text(deserializer)?.unwrap_or_default())
}
