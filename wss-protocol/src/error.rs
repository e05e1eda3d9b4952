use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error("malformed reply: {0}")]
  Json(#[from] serde_json::Error),

  #[error("reply is not a JSON object")]
  NotAnObject,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
