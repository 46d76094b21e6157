//! API error type shared by the HTTP handlers and the WebSocket loop.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Unknown journey session: {0}")]
  NotFound(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Session(#[from] SessionError),
}

impl ApiError {
  /// Machine-readable kind, used as `error` in HTTP bodies and in WS error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      ApiError::NotFound(_) => "not_found",
      ApiError::BadRequest(_) => "bad_request",
      ApiError::Session(SessionError::Loading) => "loading",
      ApiError::Session(SessionError::Complete) => "complete",
      ApiError::Session(SessionError::AdvancePending) => "advance_pending",
      ApiError::Session(SessionError::NotAnswered) => "not_answered",
      ApiError::Session(_) => "invalid_interaction",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Session(SessionError::Loading | SessionError::Complete | SessionError::AdvancePending | SessionError::NotAnswered) => {
        StatusCode::CONFLICT
      }
      ApiError::Session(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
  }
}

#[derive(Serialize)]
struct ErrorResponse {
  error: String,
  message: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = Json(ErrorResponse { error: self.kind().to_string(), message: self.to_string() });
    (self.status(), body).into_response()
  }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn not_found_status() {
    let response = ApiError::NotFound("abc".into()).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn state_conflicts_are_409() {
    for e in [SessionError::Loading, SessionError::Complete, SessionError::AdvancePending] {
      assert_eq!(ApiError::from(e).into_response().status(), StatusCode::CONFLICT);
    }
  }

  #[test]
  fn bad_interactions_are_422() {
    let e = ApiError::from(SessionError::NotOffered("x".into()));
    assert_eq!(e.kind(), "invalid_interaction");
    assert_eq!(e.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[test]
  fn message_is_transparent_for_session_errors() {
    assert_eq!(ApiError::from(SessionError::Complete).to_string(), "journey is already complete");
  }
}
