//! Parsing of single inbound messages, including bridge unwrapping.
//!
//! A bridge sits between the client and several backend servers and relays
//! each backend's reply as its own message:
//!
//! ```json
//! { "wssb": true, "serverName": "lobby", "Status": "SUCCESSFUL",
//!   "serverInfo": { "Status": "SUCCESSFUL", "MaxPlayers": 20, "Players": [] } }
//! ```

use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};
use crate::models::{BackendReply, ReplyStatus};

const BRIDGE_FLAG: &str = "wssb";
const BRIDGE_PAYLOAD: &str = "serverInfo";
const BRIDGE_NAME: &str = "serverName";
const VERSION_FIELD: &str = "wssVersion";

/// Parse one raw message into a backend reply.
pub fn parse_reply(raw: &str) -> Result<BackendReply> {
  let value: Value = serde_json::from_str(raw)?;
  let Value::Object(wrapper) = value else {
    return Err(ProtocolError::NotAnObject);
  };

  if is_bridge(&wrapper) {
    let backend = wrapper
      .get(BRIDGE_NAME)
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();
    let payload = wrapper
      .get(BRIDGE_PAYLOAD)
      .cloned()
      .unwrap_or(Value::Object(Map::new()));
    let status = find_status(&wrapper)
      .or_else(|| payload.as_object().and_then(find_status))
      .unwrap_or(ReplyStatus::Missing);
    let version = find_version(&payload).or_else(|| find_version_in(&wrapper));

    Ok(BackendReply {
      backend,
      status,
      version,
      payload,
    })
  } else {
    let status = find_status(&wrapper).unwrap_or(ReplyStatus::Missing);
    let version = find_version_in(&wrapper);

    Ok(BackendReply {
      backend: String::new(),
      status,
      version,
      payload: Value::Object(wrapper),
    })
  }
}

fn is_bridge(wrapper: &Map<String, Value>) -> bool {
  let flagged = match wrapper.get(BRIDGE_FLAG) {
    Some(Value::Bool(flag)) => *flag,
    Some(Value::Null) | None => false,
    Some(_) => true,
  };
  flagged || wrapper.get(BRIDGE_PAYLOAD).is_some_and(Value::is_object)
}

/// Status field, tolerating case variants across protocol versions.
fn find_status(object: &Map<String, Value>) -> Option<ReplyStatus> {
  object
    .iter()
    .find(|(key, _)| key.eq_ignore_ascii_case("status"))
    .and_then(|(_, value)| value.as_str())
    .map(ReplyStatus::from_text)
}

fn find_version(payload: &Value) -> Option<String> {
  payload.as_object().and_then(find_version_in)
}

fn find_version_in(object: &Map<String, Value>) -> Option<String> {
  object
    .get(VERSION_FIELD)
    .and_then(Value::as_str)
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_single_backend_reply() {
    let reply = parse_reply(r#"{"Status":"SUCCESSFUL","MaxPlayers":20,"Players":[]}"#).unwrap();
    assert_eq!(reply.backend, "");
    assert!(reply.status.is_successful());
    assert!(!reply.is_bridged());
    assert_eq!(reply.max_players(), Some(20));
  }

  #[test]
  fn test_lowercase_status_is_accepted() {
    let reply = parse_reply(r#"{"status":"SUCCESSFUL"}"#).unwrap();
    assert!(reply.status.is_successful());
  }

  #[test]
  fn test_other_and_missing_status() {
    let reply = parse_reply(r#"{"Status":"NOT AVAILABLE"}"#).unwrap();
    assert_eq!(reply.status, ReplyStatus::Other("NOT AVAILABLE".to_string()));

    let reply = parse_reply(r#"{"pong":"alive"}"#).unwrap();
    assert_eq!(reply.status, ReplyStatus::Missing);
  }

  #[test]
  fn test_bridge_reply_is_unwrapped() {
    let raw = json!({
      "wssb": true,
      "serverName": "survival",
      "serverInfo": { "Status": "SUCCESSFUL", "MaxPlayers": 10, "Players": [] }
    })
    .to_string();
    let reply = parse_reply(&raw).unwrap();
    assert_eq!(reply.backend, "survival");
    assert!(reply.status.is_successful());
    assert_eq!(reply.max_players(), Some(10));
    assert!(reply.payload.get("serverName").is_none());
  }

  #[test]
  fn test_bridge_detected_by_server_info_alone() {
    let raw = json!({
      "serverName": "creative",
      "status": "SUCCESSFUL",
      "serverInfo": { "pong": "alive", "wssVersion": "1.1.5" }
    })
    .to_string();
    let reply = parse_reply(&raw).unwrap();
    assert_eq!(reply.backend, "creative");
    assert_eq!(reply.version.as_deref(), Some("1.1.5"));
  }

  #[test]
  fn test_info_reply_server_name_is_not_a_backend() {
    let reply = parse_reply(r#"{"Status":"SUCCESSFUL","serverName":"My Server"}"#).unwrap();
    assert_eq!(reply.backend, "");
  }

  #[test]
  fn test_malformed_and_non_object_replies() {
    assert!(matches!(parse_reply("{not json"), Err(ProtocolError::Json(_))));
    assert!(matches!(parse_reply("[1,2,3]"), Err(ProtocolError::NotAnObject)));
  }
}
