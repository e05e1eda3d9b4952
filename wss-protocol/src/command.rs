//! Outbound commands understood by the WebSocketServices plugin.

use serde::Serialize;

/// A single service command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
  Ping,
  Info,
  Who,
  Whitelist,
  OfflinePlayers,
  Plugins,
  /// Details about one player (`player <name>`).
  Player(String),
}

impl Command {
  /// Service name as the plugin expects it.
  pub fn keyword(&self) -> &'static str {
    match self {
      Command::Ping => "ping",
      Command::Info => "info",
      Command::Who => "who",
      Command::Whitelist => "whitelist",
      Command::OfflinePlayers => "offlinePlayers",
      Command::Plugins => "plugins",
      Command::Player(_) => "player",
    }
  }

  pub fn argument(&self) -> Option<&str> {
    match self {
      Command::Player(name) => Some(name),
      _ => None,
    }
  }

  /// Plain-text form sent over the socket, e.g. `player Steve`.
  pub fn to_text(&self) -> String {
    match self.argument() {
      Some(argument) => format!("{} {}", self.keyword(), argument),
      None => self.keyword().to_string(),
    }
  }

  /// Key identifying the logical poll stream for this command.
  pub fn stream_key(&self) -> String {
    match self {
      Command::Player(name) => format!("player:{name}"),
      other => other.keyword().to_string(),
    }
  }
}

#[derive(Serialize)]
struct BatchEntry<'a> {
  command: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  argument: Option<&'a str>,
}

#[derive(Serialize)]
struct Batch<'a> {
  commands: Vec<BatchEntry<'a>>,
}

/// What a session sends once the connection opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
  Single(Command),
  Batch(Vec<Command>),
}

impl Request {
  /// Serializes the request into the text frame payload.
  pub fn to_payload(&self) -> String {
    match self {
      Request::Single(command) => command.to_text(),
      Request::Batch(commands) => {
        let batch = Batch {
          commands: commands
            .iter()
            .map(|c| BatchEntry {
              command: c.keyword(),
              argument: c.argument(),
            })
            .collect(),
        };
        // Only string fields, serialization cannot fail.
        serde_json::to_string(&batch).unwrap_or_default()
      }
    }
  }

  pub fn stream_key(&self) -> String {
    match self {
      Request::Single(command) => command.stream_key(),
      Request::Batch(commands) => {
        let keys: Vec<String> = commands.iter().map(Command::stream_key).collect();
        format!("batch:{}", keys.join("+"))
      }
    }
  }
}

impl From<Command> for Request {
  fn from(command: Command) -> Self {
    Request::Single(command)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{Value, json};

  #[test]
  fn test_plain_commands() {
    assert_eq!(Command::Ping.to_text(), "ping");
    assert_eq!(Command::OfflinePlayers.to_text(), "offlinePlayers");
    assert_eq!(Command::Player("Steve".into()).to_text(), "player Steve");
  }

  #[test]
  fn test_stream_keys() {
    assert_eq!(Command::Who.stream_key(), "who");
    assert_eq!(Command::Player("Alex".into()).stream_key(), "player:Alex");
  }

  #[test]
  fn test_batch_payload() {
    let request = Request::Batch(vec![Command::Who, Command::Player("Alex".into())]);
    let payload: Value = serde_json::from_str(&request.to_payload()).unwrap();
    assert_eq!(
      payload,
      json!({ "commands": [
        { "command": "who" },
        { "command": "player", "argument": "Alex" }
      ]})
    );
    assert_eq!(request.stream_key(), "batch:who+player:Alex");
  }
}
