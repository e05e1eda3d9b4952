use thiserror::Error;

use crate::skin::SkinError;
use crate::validation::ValidationError;

/// Construction and request errors surfaced to the caller of [`crate::Client`].
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("invalid websocket address: {0}")]
  InvalidAddress(String),

  #[error("websocket scheme '{scheme}' is not supported by this build")]
  NotSupported { scheme: String },

  #[error("default skin could not be loaded: {0}")]
  DefaultSkin(#[source] SkinError),

  #[error(transparent)]
  Validation(#[from] ValidationError),
}

/// Failure of a single transport session. Never fatal, polling continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  #[error("connection failed: {0}")]
  Connect(String),

  #[error("failed to send command: {0}")]
  Send(String),

  #[error("connection error while reading: {0}")]
  Read(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
