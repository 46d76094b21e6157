//! The content-generation seam: what the controller asks for and what can go wrong.

use async_trait::async_trait;
use thiserror::Error;

use crate::wire::RawJourney;

/// One generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JourneyRequest {
  pub language: String,
  pub level: u8,
}

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("content generation is disabled")]
  Disabled,

  #[error("transport error: {0}")]
  Transport(String),

  #[error("generator HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("generator returned no content")]
  Empty,

  #[error("generator returned malformed JSON: {0}")]
  Malformed(String),

  #[error("generation timed out after {0:?}")]
  Timeout(std::time::Duration),
}

/// Produces raw journey content for a (language, level).
///
/// Implementations make a single attempt; the controller owns timeout and fallback.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
  async fn generate(&self, request: &JourneyRequest) -> Result<RawJourney, GenerationError>;

  /// Short label for logs.
  fn name(&self) -> &'static str;
}

/// Used when no API key is configured: every request goes straight to fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledGenerator;

#[async_trait]
impl ContentGenerator for DisabledGenerator {
  async fn generate(&self, _request: &JourneyRequest) -> Result<RawJourney, GenerationError> {
    Err(GenerationError::Disabled)
  }

  fn name(&self) -> &'static str {
    "disabled"
  }
}
