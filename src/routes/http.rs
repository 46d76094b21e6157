//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::controller::Interaction;
use crate::error::Result;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let sessions = state.sessions.read().await.len();
  Json(HealthOut { ok: true, generator: state.generator.name(), sessions })
}

#[instrument(level = "info", skip(state, body), fields(language = %body.language, level = ?body.level))]
pub async fn http_start_journey(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartJourneyIn>,
) -> Result<impl IntoResponse> {
  let (_, view) = logic::start_journey(&state, &body.language, body.level).await?;
  info!(target: "journey", session = %view.session_id, source = ?view.source, "HTTP journey started");
  Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_journey(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<JourneyView>> {
  Ok(Json(logic::journey_view(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>> {
  let out = logic::submit_answer(&state, &id, body.attempt).await?;
  info!(target: "journey", session = %id, correct = out.verdict.correct, close_enough = out.verdict.close_enough, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_post_interact(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<Interaction>,
) -> Result<Json<JourneyView>> {
  Ok(Json(logic::interact(&state, &id, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_retry(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<JourneyView>> {
  Ok(Json(logic::retry(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Option<Json<RestartIn>>,
) -> Result<Json<JourneyView>> {
  let level = body.and_then(|Json(b)| b.level);
  Ok(Json(logic::restart(&state, &id, level).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_journey(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode> {
  logic::end_journey(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}
