//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Each operation resolves the session, drives it, and returns a fresh view.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::controller::Interaction;
use crate::domain::Attempt;
use crate::error::{ApiError, Result};
use crate::languages::clamp_level;
use crate::protocol::{AnswerOut, JourneyView};
use crate::session::LiveSession;
use crate::state::AppState;

pub async fn view_of(session: &LiveSession) -> JourneyView {
  JourneyView::from_controller(session.id(), &*session.controller().await)
}

async fn require(state: &AppState, id: &str) -> Result<Arc<LiveSession>> {
  state.get_session(id).await.ok_or_else(|| ApiError::NotFound(id.to_string()))
}

fn require_language(language: &str) -> Result<&str> {
  let language = language.trim();
  if language.is_empty() {
    return Err(ApiError::BadRequest("language must not be empty".into()));
  }
  Ok(language)
}

/// Open a new session and load its journey. Generation failures degrade to fallback content.
#[instrument(level = "info", skip(state))]
pub async fn start_journey(state: &AppState, language: &str, level: Option<i64>) -> Result<(Arc<LiveSession>, JourneyView)> {
  let language = require_language(language)?;
  state.purge_expired().await;

  let level = clamp_level(level);
  let session = state.create_session().await;
  let source = session.start(language, level).await;
  info!(target: "journey", session = %session.id(), %language, level, ?source, "Journey started");
  let view = view_of(&session).await;
  Ok((session, view))
}

#[instrument(level = "debug", skip(state))]
pub async fn journey_view(state: &AppState, id: &str) -> Result<JourneyView> {
  let session = require(state, id).await?;
  Ok(view_of(&session).await)
}

#[instrument(level = "info", skip(state, attempt))]
pub async fn submit_answer(state: &AppState, id: &str, attempt: Option<Attempt>) -> Result<AnswerOut> {
  let session = require(state, id).await?;
  submit_on(&session, attempt).await
}

pub async fn submit_on(session: &Arc<LiveSession>, attempt: Option<Attempt>) -> Result<AnswerOut> {
  let verdict = session.submit(attempt).await?;
  let journey = view_of(session).await;
  Ok(AnswerOut { verdict, journey })
}

#[instrument(level = "debug", skip(state))]
pub async fn interact(state: &AppState, id: &str, interaction: Interaction) -> Result<JourneyView> {
  let session = require(state, id).await?;
  session.interact(interaction).await?;
  Ok(view_of(&session).await)
}

#[instrument(level = "info", skip(state))]
pub async fn retry(state: &AppState, id: &str) -> Result<JourneyView> {
  let session = require(state, id).await?;
  session.retry().await?;
  Ok(view_of(&session).await)
}

/// Same language, optionally a new level; allowed from any status.
#[instrument(level = "info", skip(state))]
pub async fn restart(state: &AppState, id: &str, level: Option<i64>) -> Result<JourneyView> {
  let session = require(state, id).await?;
  session.restart(level.map(|l| clamp_level(Some(l)))).await;
  Ok(view_of(&session).await)
}

#[instrument(level = "info", skip(state))]
pub async fn end_journey(state: &AppState, id: &str) -> Result<()> {
  if state.remove_session(id).await {
    Ok(())
  } else {
    Err(ApiError::NotFound(id.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::EngineSettings;
  use crate::controller::{SessionError, Status};
  use crate::domain::{JourneySource, Round};
  use crate::generator::DisabledGenerator;

  fn state() -> AppState {
    AppState::with_generator(Arc::new(DisabledGenerator), EngineSettings::default())
  }

  #[tokio::test]
  async fn start_normalizes_level_and_uses_fallback() {
    let state = state();
    let (_, view) = start_journey(&state, "es", Some(42)).await.expect("start");
    assert_eq!(view.level, 1);
    assert_eq!(view.source, Some(JourneySource::Fallback));
    assert_eq!(view.status, Status::Practicing);

    let (_, view) = start_journey(&state, "es", Some(10)).await.expect("start");
    assert_eq!(view.level, 10);
  }

  #[tokio::test]
  async fn empty_language_is_rejected() {
    assert!(matches!(start_journey(&state(), "  ", None).await, Err(ApiError::BadRequest(_))));
  }

  #[tokio::test]
  async fn unknown_session_is_not_found() {
    let state = state();
    assert!(matches!(journey_view(&state, "nope").await, Err(ApiError::NotFound(_))));
    assert!(matches!(end_journey(&state, "nope").await, Err(ApiError::NotFound(_))));
  }

  #[tokio::test(start_paused = true)]
  async fn answer_then_delayed_advance() {
    let state = state();
    let (session, _) = start_journey(&state, "de", Some(1)).await.expect("start");
    let selected = match session.controller().await.current_round() {
      Some(Round::Matching(m)) => m.canonical_words(),
      other => panic!("unexpected {other:?}"),
    };
    let out = submit_answer(&state, session.id(), Some(Attempt::Matching { selected })).await.expect("submit");
    assert!(out.verdict.correct);
    assert!(out.journey.awaiting_advance);
    assert_eq!(out.journey.round_index, Some(0));

    let err = submit_answer(&state, session.id(), None).await.expect_err("pending");
    assert!(matches!(err, ApiError::Session(SessionError::AdvancePending)));

    tokio::time::sleep(state.settings.advance_delay() * 2).await;
    let view = journey_view(&state, session.id()).await.expect("view");
    assert_eq!(view.round_index, Some(1));
    assert!(!view.awaiting_advance);
  }

  #[tokio::test]
  async fn restart_changes_level_and_end_removes() {
    let state = state();
    let (session, _) = start_journey(&state, "fr", Some(2)).await.expect("start");
    let view = restart(&state, session.id(), Some(7)).await.expect("restart");
    assert_eq!(view.level, 7);
    assert_eq!(view.language, "fr");
    end_journey(&state, session.id()).await.expect("end");
    assert!(matches!(retry(&state, session.id()).await, Err(ApiError::NotFound(_))));
  }
}
