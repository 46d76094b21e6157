//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request, and
//! push a fresh `journey` view whenever a delayed advance lands on the bound session.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::error::ApiError;
use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::LiveSession;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "lingo_journey", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Per-connection state: the session this socket drives, if any.
#[derive(Default)]
struct Binding {
  session: Option<Arc<LiveSession>>,
  advanced: Option<watch::Receiver<u64>>,
}

impl Binding {
  fn bind(&mut self, session: Arc<LiveSession>) {
    self.advanced = Some(session.subscribe());
    self.session = Some(session);
  }

  fn clear(&mut self) {
    self.session = None;
    self.advanced = None;
  }

  fn id(&self) -> Option<String> {
    self.session.as_ref().map(|s| s.id().to_string())
  }

  /// The bound session, marked as recently used.
  fn active(&self) -> Option<&Arc<LiveSession>> {
    let session = self.session.as_ref()?;
    session.touch();
    Some(session)
  }
}

enum Event {
  Incoming(Option<Result<Message, axum::Error>>),
  Advanced(bool),
}

/// Resolves when the bound session reports an applied advance; never resolves when unbound.
async fn next_advance(advanced: &mut Option<watch::Receiver<u64>>) -> bool {
  match advanced {
    Some(rx) => rx.changed().await.is_ok(),
    None => std::future::pending().await,
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "lingo_journey", "WebSocket connected");
  let mut binding = Binding::default();

  loop {
    let event = tokio::select! {
      incoming = socket.recv() => Event::Incoming(incoming),
      alive = next_advance(&mut binding.advanced) => Event::Advanced(alive),
    };

    let reply_msg = match event {
      Event::Incoming(Some(Ok(Message::Text(txt)))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "lingo_journey", "WS received: {:?}", &incoming);
          handle_client_ws(incoming, &state, &mut binding).await
        }
        Err(e) => ServerWsMessage::Error { error: "bad_request".into(), message: format!("Invalid JSON: {}", e) },
      },
      Event::Incoming(Some(Ok(Message::Ping(payload)))) => {
        let _ = socket.send(Message::Pong(payload)).await;
        continue;
      }
      Event::Incoming(Some(Ok(Message::Close(_)))) | Event::Incoming(Some(Err(_))) | Event::Incoming(None) => break,
      Event::Incoming(Some(Ok(_))) => continue,
      Event::Advanced(false) => {
        binding.advanced = None;
        continue;
      }
      Event::Advanced(true) => match advance_push(&binding).await {
        Some(push) => push,
        None => continue,
      },
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "error": "internal", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "lingo_journey", error = %e, "WS send error");
      break;
    }
  }

  release(&state, &mut binding).await;
  info!(target: "lingo_journey", "WebSocket disconnected");
}

/// Fresh view pushed after a delayed advance lands on the bound session.
async fn advance_push(binding: &Binding) -> Option<ServerWsMessage> {
  let session = binding.session.as_ref()?;
  Some(ServerWsMessage::Journey { journey: logic::view_of(session).await })
}

/// Sessions started over a socket live only as long as the socket.
async fn release(state: &AppState, binding: &mut Binding) {
  if let Some(id) = binding.id() {
    binding.clear();
    state.remove_session(&id).await;
  }
}

fn error_msg(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error { error: e.kind().into(), message: e.to_string() }
}

fn no_session() -> ServerWsMessage {
  ServerWsMessage::Error { error: "no_session".into(), message: "Start a journey first.".into() }
}

#[instrument(level = "info", skip(state, binding))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, binding: &mut Binding) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartJourney { language, level } => {
      if let Some(previous) = binding.id() {
        state.remove_session(&previous).await;
        binding.clear();
      }
      match logic::start_journey(state, &language, level).await {
        Ok((session, journey)) => {
          info!(target: "journey", session = %journey.session_id, %language, source = ?journey.source, "WS journey started");
          binding.bind(session);
          ServerWsMessage::Journey { journey }
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::State => match binding.active() {
      Some(session) => ServerWsMessage::Journey { journey: logic::view_of(session).await },
      None => no_session(),
    },

    ClientWsMessage::SubmitAnswer { attempt } => match binding.active() {
      Some(session) => match logic::submit_on(session, attempt).await {
        Ok(result) => {
          info!(target: "journey", session = %session.id(), correct = result.verdict.correct, "WS answer evaluated");
          ServerWsMessage::AnswerResult { result }
        }
        Err(e) => error_msg(e),
      },
      None => no_session(),
    },

    ClientWsMessage::Interact { interaction } => match binding.id() {
      Some(id) => match logic::interact(state, &id, interaction).await {
        Ok(journey) => ServerWsMessage::Journey { journey },
        Err(e) => error_msg(e),
      },
      None => no_session(),
    },

    ClientWsMessage::Retry => match binding.id() {
      Some(id) => match logic::retry(state, &id).await {
        Ok(journey) => ServerWsMessage::Journey { journey },
        Err(e) => error_msg(e),
      },
      None => no_session(),
    },

    ClientWsMessage::Restart { level } => match binding.id() {
      Some(id) => match logic::restart(state, &id, level).await {
        Ok(journey) => ServerWsMessage::Journey { journey },
        Err(e) => error_msg(e),
      },
      None => no_session(),
    },

    ClientWsMessage::End => match binding.id() {
      Some(id) => {
        binding.clear();
        match logic::end_journey(state, &id).await {
          Ok(()) => ServerWsMessage::Ended,
          Err(e) => error_msg(e),
        }
      }
      None => no_session(),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use crate::config::EngineSettings;
  use crate::domain::{Attempt, Round};
  use crate::generator::DisabledGenerator;

  fn state() -> AppState {
    AppState::with_generator(Arc::new(DisabledGenerator), EngineSettings::default())
  }

  async fn start(state: &AppState, binding: &mut Binding) -> ServerWsMessage {
    let msg = ClientWsMessage::StartJourney { language: "de".into(), level: Some(1) };
    handle_client_ws(msg, state, binding).await
  }

  async fn canonical_matching(binding: &Binding) -> Attempt {
    let session = binding.session.as_ref().expect("bound");
    match session.controller().await.current_round() {
      Some(Round::Matching(m)) => Attempt::Matching { selected: m.canonical_words() },
      other => panic!("unexpected round {other:?}"),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn applied_advance_is_pushed_as_journey() {
    let state = state();
    let mut binding = Binding::default();
    assert!(matches!(start(&state, &mut binding).await, ServerWsMessage::Journey { .. }));

    let attempt = canonical_matching(&binding).await;
    let reply = handle_client_ws(ClientWsMessage::SubmitAnswer { attempt: Some(attempt) }, &state, &mut binding).await;
    let ServerWsMessage::AnswerResult { result } = reply else { panic!("expected answer result") };
    assert!(result.verdict.correct);
    assert_eq!(result.journey.round_index, Some(0));

    let submitted = tokio::time::Instant::now();
    assert!(next_advance(&mut binding.advanced).await);
    assert!(submitted.elapsed() >= state.settings.advance_delay());

    let push = advance_push(&binding).await.expect("bound session");
    let v = serde_json::to_value(&push).expect("json");
    assert_eq!(v["type"], "journey");
    assert_eq!(v["journey"]["roundIndex"], 1);
    assert_eq!(v["journey"]["awaitingAdvance"], false);
  }

  #[tokio::test]
  async fn unbound_socket_never_sees_advances() {
    let mut binding = Binding::default();
    let waited = tokio::time::timeout(Duration::from_millis(20), next_advance(&mut binding.advanced)).await;
    assert!(waited.is_err());
    assert!(advance_push(&binding).await.is_none());
  }

  #[tokio::test]
  async fn starting_again_replaces_the_bound_session() {
    let state = state();
    let mut binding = Binding::default();
    start(&state, &mut binding).await;
    let first = binding.id().expect("bound");
    start(&state, &mut binding).await;
    let second = binding.id().expect("bound");

    assert_ne!(first, second);
    assert!(state.get_session(&first).await.is_none());
    assert!(state.get_session(&second).await.is_some());
  }

  #[tokio::test]
  async fn end_and_disconnect_remove_the_session() {
    let state = state();
    let mut binding = Binding::default();
    start(&state, &mut binding).await;
    let id = binding.id().expect("bound");
    assert!(matches!(handle_client_ws(ClientWsMessage::End, &state, &mut binding).await, ServerWsMessage::Ended));
    assert!(state.get_session(&id).await.is_none());
    let reply = handle_client_ws(ClientWsMessage::State, &state, &mut binding).await;
    assert!(matches!(reply, ServerWsMessage::Error { ref error, .. } if error == "no_session"));

    start(&state, &mut binding).await;
    let id = binding.id().expect("bound");
    release(&state, &mut binding).await;
    assert!(binding.session.is_none());
    assert!(state.get_session(&id).await.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn socket_activity_keeps_session_alive() {
    let state = state();
    let mut binding = Binding::default();
    start(&state, &mut binding).await;
    let id = binding.id().expect("bound");
    let ttl = state.settings.session_ttl();

    tokio::time::advance(ttl - Duration::from_secs(60)).await;
    handle_client_ws(ClientWsMessage::State, &state, &mut binding).await;
    tokio::time::advance(Duration::from_secs(120)).await;
    let attempt = Attempt::Matching { selected: vec![] };
    handle_client_ws(ClientWsMessage::SubmitAnswer { attempt: Some(attempt) }, &state, &mut binding).await;
    tokio::time::advance(ttl - Duration::from_secs(60)).await;

    assert_eq!(state.purge_expired().await, 0);
    assert!(state.sessions.read().await.contains_key(&id));
  }
}
